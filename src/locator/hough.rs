//! Circle detection by gradient voting (the "Hough gradient" method).
//!
//! Every Canny edge pixel votes along its gradient direction, both ways, at
//! distances in `[min_radius, max_radius]`. Votes are split bilinearly over
//! the four nearest accumulator cells and the accumulator is Gaussian-smoothed,
//! so a cell's score is the vote mass landing near it. Circle centers show up
//! as local maxima of that score. Each accepted center then gets a radius from
//! the densest band of edge-pixel distances around it.

use image::{GrayImage, ImageBuffer, Luma};

use crate::config::LocatorConfig;

/// Width of the distance band used to measure radius support (pixels,
/// scaled by `dp`).
const RADIUS_BAND: f32 = 2.0;

/// Blur applied before measuring gradient directions. Hard, aliased edges
/// otherwise snap to a handful of angles and scatter their votes.
const DIRECTION_SIGMA: f32 = 1.5;

/// Accumulator smoothing, in accumulator cells.
const ACCUM_SIGMA: f32 = 1.0;

/// A detected circle with sub-pixel geometry and its accumulator score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Vote mass gathered around the center.
    pub votes: f32,
}

/// Detect circles in a (pre-smoothed) grayscale image.
///
/// Returns circles ordered by accumulator score, strongest first. The order
/// carries no meaning for callers beyond that.
pub fn hough_circles(gray: &GrayImage, config: &LocatorConfig) -> Vec<Circle> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let dp = config.dp.max(1.0);
    let min_r = config.min_radius as f32;
    let max_r = if config.max_radius == 0 {
        w.max(h) as f32
    } else {
        config.max_radius as f32
    };
    if max_r < min_r {
        return Vec::new();
    }

    let edges = imageproc::edges::canny(gray, config.param1 / 2.0, config.param1);
    let soft = imageproc::filter::gaussian_blur_f32(gray, DIRECTION_SIGMA);
    let gx = imageproc::gradients::horizontal_scharr(&soft);
    let gy = imageproc::gradients::vertical_scharr(&soft);

    let acc_w = ((w as f32 / dp).ceil() as usize).max(2);
    let acc_h = ((h as f32 / dp).ceil() as usize).max(2);
    let mut accum = vec![0.0f32; acc_w * acc_h];
    let mut edge_points: Vec<(f32, f32)> = Vec::new();

    // Accumulator cell `a` covers image pixels [a*dp, (a+1)*dp); cell centers
    // sit at integer accumulator coordinates.
    let to_acc = |p: f32| (p + 0.5) / dp - 0.5;
    let (u_limit, v_limit) = ((acc_w - 1) as f32, (acc_h - 1) as f32);

    for (x, y, edge) in edges.enumerate_pixels() {
        if edge[0] == 0 {
            continue;
        }
        let dx = gx.get_pixel(x, y)[0] as f32;
        let dy = gy.get_pixel(x, y)[0] as f32;
        let mag = (dx * dx + dy * dy).sqrt();
        if mag < f32::EPSILON {
            continue;
        }
        let (xf, yf) = (x as f32, y as f32);
        edge_points.push((xf, yf));

        let (ux, uy) = (dx / mag, dy / mag);
        for sign in [1.0f32, -1.0] {
            let mut r = min_r;
            while r <= max_r {
                let u = to_acc(xf + sign * ux * r);
                let v = to_acc(yf + sign * uy * r);
                if u < 0.0 || v < 0.0 || u >= u_limit || v >= v_limit {
                    break;
                }
                bilinear_add(&mut accum, acc_w, u, v);
                r += 1.0;
            }
        }
    }

    if edge_points.is_empty() {
        return Vec::new();
    }

    let Some(scores) = smooth_accumulator(accum, acc_w, acc_h) else {
        return Vec::new();
    };
    let mut centers = local_maxima(&scores, acc_w, acc_h, config.param2);
    centers.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    tracing::debug!(
        edges = edge_points.len(),
        centers = centers.len(),
        "hough voting done"
    );

    let min_dist_sq = config.min_dist * config.min_dist;
    let band = RADIUS_BAND * dp;
    let mut circles: Vec<Circle> = Vec::new();
    let mut dists: Vec<f32> = Vec::with_capacity(edge_points.len());

    for (cell, votes) in centers {
        let cx = ((cell % acc_w) as f32 + 0.5) * dp - 0.5;
        let cy = ((cell / acc_w) as f32 + 0.5) * dp - 0.5;

        let crowded = circles.iter().any(|c| {
            let (ddx, ddy) = (c.x - cx, c.y - cy);
            ddx * ddx + ddy * ddy < min_dist_sq
        });
        if crowded {
            continue;
        }

        dists.clear();
        dists.extend(edge_points.iter().filter_map(|&(ex, ey)| {
            let d = ((ex - cx).powi(2) + (ey - cy).powi(2)).sqrt();
            (d >= min_r && d <= max_r).then_some(d)
        }));
        if let Some((radius, support)) = best_radius(&mut dists, band) {
            if radius >= 1.0 && support as f32 > config.param2 {
                circles.push(Circle {
                    x: cx,
                    y: cy,
                    radius,
                    votes,
                });
            }
        }
    }

    circles
}

/// Split one vote over the four cells around `(u, v)`. Callers keep
/// `u < width - 1` and `v < height - 1`.
#[inline]
fn bilinear_add(accum: &mut [f32], stride: usize, u: f32, v: f32) {
    let (u0, v0) = (u as usize, v as usize);
    let (fu, fv) = (u - u0 as f32, v - v0 as f32);
    let base = v0 * stride + u0;
    accum[base] += (1.0 - fu) * (1.0 - fv);
    accum[base + 1] += fu * (1.0 - fv);
    accum[base + stride] += (1.0 - fu) * fv;
    accum[base + stride + 1] += fu * fv;
}

/// Gaussian-weighted vote mass around each cell. The blur is rescaled by the
/// kernel's area, so votes piled into one cell keep their count while votes
/// scattered over neighbouring cells are gathered back together.
fn smooth_accumulator(accum: Vec<f32>, w: usize, h: usize) -> Option<Vec<f32>> {
    let image = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w as u32, h as u32, accum)?;
    let area = 2.0 * std::f32::consts::PI * ACCUM_SIGMA * ACCUM_SIGMA;
    let smoothed = imageproc::filter::gaussian_blur_f32(&image, ACCUM_SIGMA);
    Some(smoothed.into_raw().into_iter().map(|v| v * area).collect())
}

/// Accumulator cells that beat their 4-neighbourhood and exceed `threshold`.
/// Plateaus resolve to their top-left cell.
fn local_maxima(scores: &[f32], w: usize, h: usize, threshold: f32) -> Vec<(usize, f32)> {
    let at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x as usize >= w || y as usize >= h {
            0.0
        } else {
            scores[y as usize * w + x as usize]
        }
    };

    let mut out = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let v = scores[y * w + x];
            if v <= threshold {
                continue;
            }
            let (xi, yi) = (x as isize, y as isize);
            if v > at(xi - 1, yi) && v >= at(xi + 1, yi) && v > at(xi, yi - 1) && v >= at(xi, yi + 1)
            {
                out.push((y * w + x, v));
            }
        }
    }
    out
}

/// Find the distance band of width `band` with the best radius-normalised
/// support. Returns the mean distance in that band and its point count.
fn best_radius(dists: &mut [f32], band: f32) -> Option<(f32, usize)> {
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(f32::total_cmp);

    let mut best: Option<(usize, usize, f32)> = None;
    let mut j = 0;
    for i in 0..dists.len() {
        j = j.max(i);
        while j + 1 < dists.len() && dists[j + 1] - dists[i] <= band {
            j += 1;
        }
        let count = j - i + 1;
        let r_mid = ((dists[i] + dists[j]) / 2.0).max(1.0);
        let score = count as f32 / r_mid;
        if best.map_or(true, |(_, _, s)| score > s) {
            best = Some((i, j, score));
        }
    }

    best.map(|(i, j, _)| {
        let window = &dists[i..=j];
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        (mean, window.len())
    })
}
