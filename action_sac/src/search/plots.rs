//! Study visualizations: standalone HTML pages wrapping inline SVG charts.
//!
//! Only trials with a finite objective are drawn. Log-scaled parameters are
//! plotted as `log10(value)`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use super::space::{ParamSpec, ParamValue, SearchSpace};
use super::trial::TrialRecord;
use crate::error::{Error, Result};

pub const HISTORY_FILE: &str = "optimization_history_sac.html";
pub const CONTOUR_FILE: &str = "contour_sac.html";
pub const SLICE_FILE: &str = "slice_sac.html";
pub const IMPORTANCE_FILE: &str = "param_importances_sac.html";

const PANEL: (u32, u32) = (360, 300);
const FONT: &str = "sans-serif";

fn plot_err<E: std::fmt::Debug>(e: E) -> Error {
    Error::Plot(format!("{e:?}"))
}

// ============================================================================
// Helpers
// ============================================================================

/// Finished trials with a finite objective.
fn scored(trials: &[TrialRecord]) -> Vec<(&TrialRecord, f64)> {
    trials
        .iter()
        .filter_map(|t| t.finished_value().map(|v| (t, v)))
        .filter(|(_, v)| v.is_finite())
        .collect()
}

fn axis_value(spec: &ParamSpec, value: &ParamValue) -> f64 {
    if spec.is_log() {
        value.as_f64().max(f64::MIN_POSITIVE).log10()
    } else {
        value.as_f64()
    }
}

fn axis_label(name: &str, spec: &ParamSpec) -> String {
    if spec.is_log() {
        format!("log10({name})")
    } else {
        name.to_string()
    }
}

fn axis_bounds(spec: &ParamSpec) -> (f64, f64) {
    let (lo, hi) = spec.bounds();
    if spec.is_log() {
        padded(lo.max(f64::MIN_POSITIVE).log10(), hi.max(f64::MIN_POSITIVE).log10())
    } else {
        padded(lo, hi)
    }
}

/// Range with a 5% margin; degenerate ranges widen by one unit.
fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let span = hi - lo;
    if !span.is_finite() || span.abs() < 1e-12 {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo - 0.05 * span, hi + 0.05 * span)
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Dark blue through teal to yellow for `t` in `[0, 1]`.
fn ramp(t: f64) -> RGBColor {
    let stops = [(68.0, 1.0, 84.0), (33.0, 145.0, 140.0), (253.0, 231.0, 37.0)];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let (a, b, f) = if t < 0.5 {
        (stops[0], stops[1], t * 2.0)
    } else {
        (stops[1], stops[2], (t - 0.5) * 2.0)
    };
    let mix = |x: f64, y: f64| (x + (y - x) * f).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn normalized(v: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        (v - lo) / (hi - lo)
    } else {
        0.5
    }
}

fn render_svg<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;
        draw(&root)?;
        root.present().map_err(plot_err)?;
    }
    Ok(svg)
}

fn draw_empty(area: &DrawingArea<SVGBackend<'_>, Shift>) -> Result<()> {
    area.draw(&Text::new(
        "No completed trials",
        (20, 20),
        (FONT, 16).into_font(),
    ))
    .map_err(plot_err)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_page(title: &str, svgs: &[String]) -> String {
    let title = escape(title);
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h2>{title}</h2>\n"
    );
    for svg in svgs {
        page.push_str("<div>\n");
        page.push_str(svg);
        page.push_str("\n</div>\n");
    }
    page.push_str("</body>\n</html>\n");
    page
}

fn grid(n: usize) -> (usize, usize) {
    let cols = n.clamp(1, 3);
    (n.div_ceil(cols).max(1), cols)
}

// ============================================================================
// Charts
// ============================================================================

/// Objective per trial with the running best.
pub fn optimization_history_svg(trials: &[TrialRecord]) -> Result<String> {
    let points: Vec<(f64, f64)> = scored(trials)
        .into_iter()
        .map(|(t, v)| (t.number as f64, v))
        .collect();
    let best: Vec<(f64, f64)> = points
        .iter()
        .scan(f64::NEG_INFINITY, |best, &(x, y)| {
            *best = best.max(y);
            Some((x, *best))
        })
        .collect();

    render_svg((720, 420), |root| {
        if points.is_empty() {
            return draw_empty(root);
        }
        let (x0, x1) = padded(points[0].0, points[points.len() - 1].0);
        let (y_lo, y_hi) = min_max(points.iter().map(|p| p.1));
        let (y0, y1) = padded(y_lo, y_hi);

        let mut chart = ChartBuilder::on(root)
            .caption("Optimization History", (FONT, 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc("Trial")
            .y_desc("Objective Value")
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(points.iter().map(|p| Circle::new(*p, 4, BLUE.filled())))
            .map_err(plot_err)?
            .label("Objective Value")
            .legend(|(x, y)| Circle::new((x, y), 4, BLUE.filled()));
        chart
            .draw_series(LineSeries::new(best.iter().copied(), RED.stroke_width(2)))
            .map_err(plot_err)?
            .label("Best Value")
            .legend(|(x, y)| PathElement::new(vec![(x - 10, y), (x + 10, y)], RED));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
        Ok(())
    })
}

/// Objective against each parameter, colored by trial number.
pub fn slice_svg(space: &SearchSpace, trials: &[TrialRecord]) -> Result<String> {
    let points = scored(trials);
    let names: Vec<(&String, &ParamSpec)> = space.params.iter().collect();
    let (rows, cols) = grid(names.len());
    let size = (PANEL.0 * cols as u32, PANEL.1 * rows as u32);

    render_svg(size, |root| {
        if points.is_empty() {
            return draw_empty(root);
        }
        let (y_lo, y_hi) = min_max(points.iter().map(|p| p.1));
        let (y0, y1) = padded(y_lo, y_hi);
        let last = points.iter().map(|(t, _)| t.number).max().unwrap_or(0) as f64;

        for ((name, spec), area) in names.iter().zip(root.split_evenly((rows, cols))) {
            let (x0, x1) = axis_bounds(spec);
            let mut chart = ChartBuilder::on(&area)
                .caption(name.as_str(), (FONT, 14))
                .margin(8)
                .x_label_area_size(30)
                .y_label_area_size(50)
                .build_cartesian_2d(x0..x1, y0..y1)
                .map_err(plot_err)?;
            chart
                .configure_mesh()
                .x_desc(axis_label(name, spec))
                .y_desc("Objective Value")
                .draw()
                .map_err(plot_err)?;
            chart
                .draw_series(points.iter().filter_map(|(t, v)| {
                    let x = axis_value(spec, t.params.get(name.as_str())?);
                    let color = ramp(normalized(t.number as f64, 0.0, last));
                    Some(Circle::new((x, *v), 4, color.filled()))
                }))
                .map_err(plot_err)?;
        }
        Ok(())
    })
}

/// Every parameter pair, trials colored by objective (dark is worse).
pub fn contour_svg(space: &SearchSpace, trials: &[TrialRecord]) -> Result<String> {
    let points = scored(trials);
    let names: Vec<(&String, &ParamSpec)> = space.params.iter().collect();
    let pairs: Vec<(usize, usize)> = (0..names.len())
        .flat_map(|i| (i + 1..names.len()).map(move |j| (i, j)))
        .collect();
    let (rows, cols) = grid(pairs.len());
    let size = (PANEL.0 * cols as u32, PANEL.1 * rows as u32);

    render_svg(size, |root| {
        if points.is_empty() || pairs.is_empty() {
            return draw_empty(root);
        }
        let (v_lo, v_hi) = min_max(points.iter().map(|p| p.1));

        for (&(i, j), area) in pairs.iter().zip(root.split_evenly((rows, cols))) {
            let (x_name, x_spec) = names[i];
            let (y_name, y_spec) = names[j];
            let (x0, x1) = axis_bounds(x_spec);
            let (y0, y1) = axis_bounds(y_spec);
            let mut chart = ChartBuilder::on(&area)
                .margin(8)
                .x_label_area_size(30)
                .y_label_area_size(50)
                .build_cartesian_2d(x0..x1, y0..y1)
                .map_err(plot_err)?;
            chart
                .configure_mesh()
                .x_desc(axis_label(x_name, x_spec))
                .y_desc(axis_label(y_name, y_spec))
                .draw()
                .map_err(plot_err)?;
            chart
                .draw_series(points.iter().filter_map(|(t, v)| {
                    let x = axis_value(x_spec, t.params.get(x_name.as_str())?);
                    let y = axis_value(y_spec, t.params.get(y_name.as_str())?);
                    Some(Circle::new((x, y), 5, ramp(normalized(*v, v_lo, v_hi)).filled()))
                }))
                .map_err(plot_err)?;
        }
        Ok(())
    })
}

/// Horizontal bars of [`param_importances`].
pub fn importance_svg(importances: &[(String, f64)]) -> Result<String> {
    let height = 80 + 40 * importances.len().max(1) as u32;
    render_svg((720, height), |root| {
        if importances.is_empty() {
            return draw_empty(root);
        }
        let n = importances.len() as f64;
        let mut chart = ChartBuilder::on(root)
            .caption("Hyperparameter Importances", (FONT, 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(10)
            .build_cartesian_2d(0.0..1.4, 0.0..n)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_label_formatter(&|_| String::new())
            .x_desc("Importance for Objective Value")
            .draw()
            .map_err(plot_err)?;

        // Most important on top
        let rows = importances.iter().rev().enumerate();
        chart
            .draw_series(rows.clone().map(|(i, (_, imp))| {
                Rectangle::new(
                    [(0.0, i as f64 + 0.15), (*imp, i as f64 + 0.85)],
                    BLUE.mix(0.7).filled(),
                )
            }))
            .map_err(plot_err)?;
        chart
            .draw_series(rows.map(|(i, (name, imp))| {
                Text::new(
                    format!("{name} ({imp:.2})"),
                    (imp + 0.02, i as f64 + 0.4),
                    (FONT, 13).into_font(),
                )
            }))
            .map_err(plot_err)?;
        Ok(())
    })
}

// ============================================================================
// Importance
// ============================================================================

/// Share of objective variance explained by each parameter (correlation
/// ratio η²), normalized to sum to one and sorted most important first.
///
/// Choices group by value; continuous parameters by rank into up to four
/// equally populated bins.
pub fn param_importances(space: &SearchSpace, trials: &[TrialRecord]) -> Vec<(String, f64)> {
    let points = scored(trials);
    let mean = points.iter().map(|p| p.1).sum::<f64>() / points.len().max(1) as f64;
    let total: f64 = points.iter().map(|p| (p.1 - mean).powi(2)).sum();

    let mut importances: Vec<(String, f64)> = space
        .params
        .iter()
        .map(|(name, spec)| {
            let with_param: Vec<(&ParamValue, f64)> = points
                .iter()
                .filter_map(|(t, v)| t.params.get(name).map(|p| (p, *v)))
                .collect();
            if total <= 0.0 || with_param.len() < 2 {
                return (name.clone(), 0.0);
            }

            let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
            match spec {
                ParamSpec::Float { .. } => {
                    let mut order: Vec<usize> = (0..with_param.len()).collect();
                    order.sort_by(|&a, &b| with_param[a].0.as_f64().total_cmp(&with_param[b].0.as_f64()));
                    let n_bins = with_param.len().min(4);
                    for (rank, &idx) in order.iter().enumerate() {
                        let bin = (rank * n_bins / with_param.len()) as i64;
                        groups.entry(bin).or_default().push(with_param[idx].1);
                    }
                }
                ParamSpec::IntChoice(_) | ParamSpec::BoolChoice => {
                    for (value, v) in &with_param {
                        groups.entry(value.as_f64() as i64).or_default().push(*v);
                    }
                }
            }

            let between: f64 = groups
                .values()
                .map(|g| {
                    let g_mean = g.iter().sum::<f64>() / g.len() as f64;
                    g.len() as f64 * (g_mean - mean).powi(2)
                })
                .sum();
            (name.clone(), (between / total).clamp(0.0, 1.0))
        })
        .collect();

    let sum: f64 = importances.iter().map(|(_, imp)| imp).sum();
    if sum > 0.0 {
        for (_, imp) in &mut importances {
            *imp /= sum;
        }
    }
    importances.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    importances
}

// ============================================================================
// Output
// ============================================================================

/// Write the four study pages into `dir`.
pub fn write_study_plots(
    dir: &Path,
    study_name: &str,
    space: &SearchSpace,
    trials: &[TrialRecord],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let importances = param_importances(space, trials);
    let pages = [
        (
            HISTORY_FILE,
            "Optimization History",
            vec![optimization_history_svg(trials)?],
        ),
        (CONTOUR_FILE, "Contour", vec![contour_svg(space, trials)?]),
        (SLICE_FILE, "Slice", vec![slice_svg(space, trials)?]),
        (
            IMPORTANCE_FILE,
            "Hyperparameter Importances",
            vec![importance_svg(&importances)?],
        ),
    ];

    let mut written = Vec::with_capacity(pages.len());
    for (file, title, svgs) in pages {
        let path = dir.join(file);
        fs::write(&path, html_page(&format!("{title}: {study_name}"), &svgs))?;
        log::info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
