//! SVG chart adapter implementing ChartPort.
//!
//! Each chart is two stacked panels: the source series on top and the event
//! bars underneath, scaled independently.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::bar::EventBar;
use crate::domain::error::CusumError;
use crate::domain::observation::Observation;
use crate::domain::summary::bars_in_window;
use crate::ports::chart_port::ChartPort;

const CHART_WIDTH: f64 = 1200.0;
const PANEL_HEIGHT: f64 = 320.0;
const PANEL_GAP: f64 = 40.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 30.0;

const UP_COLOR: &str = "#16a34a";
const DOWN_COLOR: &str = "#dc2626";

#[derive(Debug, Clone, Copy)]
struct Panel {
    top: f64,
    min: f64,
    max: f64,
}

impl Panel {
    fn new(index: usize, min: f64, max: f64) -> Self {
        // Flat series still get a visible band.
        let (min, max) = if max > min { (min, max) } else { (min - 1.0, max + 1.0) };
        Self {
            top: MARGIN_TOP + index as f64 * (PANEL_HEIGHT + PANEL_GAP),
            min,
            max,
        }
    }

    fn plot_width() -> f64 {
        CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn bottom(&self) -> f64 {
        self.top + PANEL_HEIGHT
    }

    fn y(&self, price: f64) -> f64 {
        self.bottom() - ((price - self.min) / (self.max - self.min)) * PANEL_HEIGHT
    }
}

fn chart_height(panels: usize) -> f64 {
    MARGIN_TOP + panels as f64 * PANEL_HEIGHT + (panels - 1) as f64 * PANEL_GAP + MARGIN_BOTTOM
}

fn price_range<I: Iterator<Item = (f64, f64)>>(lows_highs: I) -> (f64, f64) {
    lows_highs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (l, h)| {
        (lo.min(l), hi.max(h))
    })
}

fn open_svg(svg: &mut String, height: f64) {
    svg.push_str(&format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, height, CHART_WIDTH, height
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
}

fn push_frame(svg: &mut String, panel: &Panel, title: &str) {
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" font-size=\"13\" fill=\"#333\">{}</text>\n",
        MARGIN_LEFT,
        panel.top - 8.0,
        title
    ));
    svg.push_str(&format!(
        "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        panel.top,
        Panel::plot_width(),
        PANEL_HEIGHT
    ));
    for price in [panel.max, (panel.max + panel.min) / 2.0, panel.min] {
        let y = panel.y(price);
        svg.push_str(&format!(
            "  <line x1=\"{}\" y1=\"{:.1}\" x2=\"{}\" y2=\"{:.1}\" stroke=\"#eee\" stroke-width=\"1\"/>\n",
            MARGIN_LEFT,
            y,
            CHART_WIDTH - MARGIN_RIGHT,
            y
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{:.2}</text>\n",
            MARGIN_LEFT - 5.0,
            y + 3.0,
            price
        ));
    }
}

fn push_time_labels(svg: &mut String, panel: &Panel, start: NaiveDateTime, end: NaiveDateTime) {
    let y = panel.bottom() + 14.0;
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"start\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        MARGIN_LEFT,
        y,
        start.format("%Y-%m-%d %H:%M")
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        CHART_WIDTH - MARGIN_RIGHT,
        y,
        end.format("%Y-%m-%d %H:%M")
    ));
}

fn push_empty_message(svg: &mut String, panel: &Panel, message: &str) {
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"14\" fill=\"#999\">{}</text>\n",
        MARGIN_LEFT + Panel::plot_width() / 2.0,
        panel.top + PANEL_HEIGHT / 2.0,
        message
    ));
}

fn push_path(svg: &mut String, points: &[(f64, f64)], color: &str, width: f64) {
    let mut path_data = String::new();
    for (i, (x, y)) in points.iter().enumerate() {
        if i == 0 {
            path_data.push_str(&format!("M {:.1} {:.1}", x, y));
        } else {
            path_data.push_str(&format!(" L {:.1} {:.1}", x, y));
        }
    }
    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>\n",
        path_data, color, width
    ));
}

/// Original closes over time above, bar closes at each bar's end time below.
pub fn close_comparison_svg(observations: &[Observation], bars: &[EventBar]) -> String {
    if observations.is_empty() {
        return String::new();
    }

    let start = observations[0].open_time;
    let end = observations[observations.len() - 1].open_time;
    let span_ms = (end - start).num_milliseconds().max(1) as f64;
    let x_at = |t: NaiveDateTime| {
        MARGIN_LEFT + ((t - start).num_milliseconds() as f64 / span_ms) * Panel::plot_width()
    };

    let (lo, hi) = price_range(observations.iter().map(|o| (o.close, o.close)));
    let top = Panel::new(0, lo, hi);

    let bar_points: Vec<(NaiveDateTime, f64)> = bars
        .iter()
        .filter_map(|b| observations.get(b.end_idx).map(|o| (o.open_time, b.close)))
        .collect();
    let (lo, hi) = price_range(bar_points.iter().map(|&(_, c)| (c, c)));
    let bottom = Panel::new(1, lo, hi);

    let mut svg = String::new();
    open_svg(&mut svg, chart_height(2));

    push_frame(&mut svg, &top, "Original Close Price");
    let points: Vec<(f64, f64)> = observations
        .iter()
        .map(|o| (x_at(o.open_time), top.y(o.close)))
        .collect();
    push_path(&mut svg, &points, "#2563eb", 0.7);
    push_time_labels(&mut svg, &top, start, end);

    if bar_points.is_empty() {
        let empty = Panel::new(1, 0.0, 1.0);
        push_frame(&mut svg, &empty, "CUSUM Close Price");
        push_empty_message(&mut svg, &empty, "No CUSUM bars");
    } else {
        push_frame(&mut svg, &bottom, "CUSUM Close Price");
        let points: Vec<(f64, f64)> = bar_points
            .iter()
            .map(|&(t, c)| (x_at(t), bottom.y(c)))
            .collect();
        push_path(&mut svg, &points, DOWN_COLOR, 0.9);
    }
    push_time_labels(&mut svg, &bottom, start, end);

    svg.push_str("</svg>");
    svg
}

struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

fn push_candles(svg: &mut String, panel: &Panel, candles: &[Candle]) {
    let slot = Panel::plot_width() / candles.len() as f64;
    let body_width = (slot * 0.6).max(0.5);

    for (i, c) in candles.iter().enumerate() {
        let center = MARGIN_LEFT + (i as f64 + 0.5) * slot;
        let color = if c.close >= c.open { UP_COLOR } else { DOWN_COLOR };

        svg.push_str(&format!(
            "  <line x1=\"{:.2}\" y1=\"{:.1}\" x2=\"{:.2}\" y2=\"{:.1}\" stroke=\"black\" stroke-width=\"1\"/>\n",
            center,
            panel.y(c.high),
            center,
            panel.y(c.low)
        ));

        let body_top = panel.y(c.open.max(c.close));
        let body_height = (panel.y(c.open.min(c.close)) - body_top).max(0.5);
        svg.push_str(&format!(
            "  <rect x=\"{:.2}\" y=\"{:.1}\" width=\"{:.2}\" height=\"{:.1}\" fill=\"{}\" fill-opacity=\"0.8\" stroke=\"black\" stroke-width=\"0.5\"/>\n",
            center - body_width / 2.0,
            body_top,
            body_width,
            body_height,
            color
        ));
    }
}

/// Last `window` observations as candles above, and the bars ending in that
/// stretch below.
pub fn candlestick_comparison_svg(
    observations: &[Observation],
    bars: &[EventBar],
    window: usize,
) -> String {
    if observations.is_empty() || window == 0 {
        return String::new();
    }

    let tail = &observations[observations.len().saturating_sub(window)..];
    let selected = bars_in_window(bars, observations.len(), window);

    let regular: Vec<Candle> = tail
        .iter()
        .map(|o| Candle {
            open: o.open,
            high: o.high,
            low: o.low,
            close: o.close,
        })
        .collect();
    let cusum: Vec<Candle> = selected
        .iter()
        .map(|b| Candle {
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
        .collect();

    let (lo, hi) = price_range(regular.iter().map(|c| (c.low, c.high)));
    let top = Panel::new(0, lo, hi);

    let mut svg = String::new();
    open_svg(&mut svg, chart_height(2));

    push_frame(
        &mut svg,
        &top,
        &format!("Last {} regular candles", regular.len()),
    );
    push_candles(&mut svg, &top, &regular);

    if cusum.is_empty() {
        let bottom = Panel::new(1, 0.0, 1.0);
        push_frame(&mut svg, &bottom, "CUSUM candles for the same period");
        push_empty_message(&mut svg, &bottom, "No CUSUM candles for this period");
    } else {
        let (lo, hi) = price_range(cusum.iter().map(|c| (c.low, c.high)));
        let bottom = Panel::new(1, lo, hi);
        push_frame(
            &mut svg,
            &bottom,
            &format!("CUSUM candles for the same period ({} candles)", cusum.len()),
        );
        push_candles(&mut svg, &bottom, &cusum);
    }

    svg.push_str("</svg>");
    svg
}

pub struct SvgChartAdapter;

impl SvgChartAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write(svg: String, output_path: &Path) -> Result<(), CusumError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, svg)?;
        Ok(())
    }
}

impl Default for SvgChartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartPort for SvgChartAdapter {
    fn write_close_comparison(
        &self,
        observations: &[Observation],
        bars: &[EventBar],
        output_path: &Path,
    ) -> Result<(), CusumError> {
        Self::write(close_comparison_svg(observations, bars), output_path)
    }

    fn write_candlestick_comparison(
        &self,
        observations: &[Observation],
        bars: &[EventBar],
        window: usize,
        output_path: &Path,
    ) -> Result<(), CusumError> {
        Self::write(
            candlestick_comparison_svg(observations, bars, window),
            output_path,
        )
    }
}
