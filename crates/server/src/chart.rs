use log::{error, info};
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::error::ChartError;
use shared::{Asset, ChartRecord};

/// Consumes one collection run and produces a rendered artifact.
/// Returns whether rendering succeeded; never panics on bad input.
pub trait ChartSink: Send + Sync {
    fn render(&self, records: &[ChartRecord]) -> bool;
}

const WIDTH: f64 = 1200.0;
const PANEL_HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 100.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 50.0;
const COLORS: [&str; 6] = ["orange", "blue", "purple", "green", "crimson", "teal"];

/// One stacked line panel per asset, written as SVG.
pub struct SvgChartSink {
    path: PathBuf,
    assets: Vec<Asset>,
    currency: String,
}

impl SvgChartSink {
    pub fn new(path: impl Into<PathBuf>, assets: Vec<Asset>, currency: &str) -> Self {
        SvgChartSink {
            path: path.into(),
            assets,
            currency: currency.to_uppercase(),
        }
    }

    pub fn draw(&self, records: &[ChartRecord]) -> Result<String, ChartError> {
        if records.is_empty() || self.assets.is_empty() {
            return Err(ChartError::Empty);
        }

        let height = PANEL_HEIGHT * self.assets.len() as f64;
        let mut svg = String::new();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">"#,
            w = WIDTH,
            h = height
        )?;
        writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;

        for (index, asset) in self.assets.iter().enumerate() {
            let color = COLORS[index % COLORS.len()];
            let is_last = index + 1 == self.assets.len();
            self.draw_panel(&mut svg, records, asset, color, index as f64 * PANEL_HEIGHT, is_last)?;
        }

        writeln!(svg, "</svg>")?;
        Ok(svg)
    }

    fn draw_panel(
        &self,
        svg: &mut String,
        records: &[ChartRecord],
        asset: &Asset,
        color: &str,
        offset_y: f64,
        show_time_axis: bool,
    ) -> Result<(), ChartError> {
        let left = MARGIN_LEFT;
        let right = WIDTH - MARGIN_RIGHT;
        let top = offset_y + MARGIN_TOP;
        let bottom = offset_y + PANEL_HEIGHT - MARGIN_BOTTOM;

        writeln!(
            svg,
            r#"<text x="{}" y="{}" font-size="16" text-anchor="middle">{} Price Movement</text>"#,
            WIDTH / 2.0,
            offset_y + 30.0,
            escape(&asset.name)
        )?;
        writeln!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#ccc"/>"##,
            left,
            top,
            right - left,
            bottom - top
        )?;
        writeln!(
            svg,
            r#"<text x="20" y="{}" fill="{}" transform="rotate(-90 20 {})" text-anchor="middle">{} Price ({})</text>"#,
            (top + bottom) / 2.0,
            color,
            (top + bottom) / 2.0,
            escape(&asset.name),
            escape(&self.currency)
        )?;

        let values: Vec<Option<f64>> = records
            .iter()
            .map(|r| r.prices.get(&asset.id).copied().flatten())
            .collect();
        let present: Vec<f64> = values.iter().flatten().copied().collect();

        if present.is_empty() {
            writeln!(
                svg,
                r##"<text x="{}" y="{}" text-anchor="middle" fill="#999">No data</text>"##,
                (left + right) / 2.0,
                (top + bottom) / 2.0
            )?;
            return Ok(());
        }

        let mut min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let mut max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (max - min).abs() < f64::EPSILON {
            let pad = (min.abs() * 0.005).max(1.0);
            min -= pad;
            max += pad;
        }

        let x_at = |i: usize| {
            if records.len() == 1 {
                (left + right) / 2.0
            } else {
                left + (right - left) * i as f64 / (records.len() - 1) as f64
            }
        };
        let y_at = |v: f64| bottom - (bottom - top) * (v - min) / (max - min);

        // Horizontal grid with min / mid / max labels
        for v in [min, (min + max) / 2.0, max] {
            let y = y_at(v);
            writeln!(
                svg,
                r##"<line x1="{}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="#eee"/>"##,
                left, y, right, y
            )?;
            writeln!(
                svg,
                r#"<text x="{}" y="{:.1}" text-anchor="end" fill="{}">{:.2}</text>"#,
                left - 6.0,
                y + 4.0,
                color,
                v
            )?;
        }

        // Gaps split the line into segments
        let mut segment: Vec<String> = Vec::new();
        let mut segments: Vec<Vec<String>> = Vec::new();
        for (i, value) in values.iter().enumerate() {
            match value {
                Some(v) => segment.push(format!("{:.1},{:.1}", x_at(i), y_at(*v))),
                None => {
                    if !segment.is_empty() {
                        segments.push(std::mem::take(&mut segment));
                    }
                }
            }
        }
        if !segment.is_empty() {
            segments.push(segment);
        }

        for points in &segments {
            writeln!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                points.join(" "),
                color
            )?;
        }
        for (i, value) in values.iter().enumerate() {
            if let Some(v) = value {
                writeln!(
                    svg,
                    r#"<circle cx="{:.1}" cy="{:.1}" r="4" fill="{}"/>"#,
                    x_at(i),
                    y_at(*v),
                    color
                )?;
            }
        }

        if show_time_axis {
            for (i, record) in records.iter().enumerate() {
                let label = record.time.split_whitespace().last().unwrap_or(&record.time);
                writeln!(
                    svg,
                    r#"<text x="{:.1}" y="{}" text-anchor="middle">{}</text>"#,
                    x_at(i),
                    bottom + 20.0,
                    escape(label)
                )?;
            }
            writeln!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="middle">Time</text>"#,
                (left + right) / 2.0,
                bottom + 40.0
            )?;
        }

        Ok(())
    }

    fn write(&self, svg: &str) -> Result<(), ChartError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Readers of the chart file only ever see a complete render
        let staging = self.path.with_extension("svg.tmp");
        if let Err(e) = std::fs::write(&staging, svg) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl ChartSink for SvgChartSink {
    fn render(&self, records: &[ChartRecord]) -> bool {
        match self.draw(records).and_then(|svg| self.write(&svg)) {
            Ok(()) => {
                info!("Chart saved to {}", self.path.display());
                true
            }
            Err(e) => {
                error!("Error creating chart: {}", e);
                false
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
