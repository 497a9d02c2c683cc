use plotters::prelude::*;
use std::error::Error;

use crate::pipeline::ChartPoint;

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 600;

/// Render the per-ERO totals as a PNG bar chart.
///
/// One bar per label, tallest first (the series arrives pre-sorted). An
/// empty series renders a placeholder image rather than erroring.
///
/// # Arguments
/// * `series` - Labeled sums, e.g. the per-ERO `totAmt` totals
/// * `title` - Caption drawn above the chart
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - PNG image data or an error
pub fn render_bar_chart(series: &[ChartPoint], title: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let scratch = tempfile::Builder::new().suffix(".png").tempfile()?;
    let path = scratch.path().to_path_buf();
    {
        let root = BitMapBackend::new(&path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        if series.is_empty() {
            draw_placeholder(&root)?;
        } else {
            let y_max = axis_max(series);
            let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();

            let mut chart = ChartBuilder::on(&root)
                .caption(title, ("sans-serif", 30).into_font())
                .margin(10)
                .x_label_area_size(60)
                .y_label_area_size(80)
                .build_cartesian_2d(0f64..series.len() as f64, 0f64..y_max)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(labels.len())
                .x_label_formatter(&|x| label_at(&labels, *x))
                .y_desc("totAmt")
                .draw()?;

            chart.draw_series(series.iter().enumerate().map(|(i, point)| {
                Rectangle::new(
                    [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, point.total)],
                    BLUE.filled(),
                )
            }))?;
        }

        root.present()?;
    }

    let png = std::fs::read(&path)?;
    Ok(png)
}

/// Render the month-wise totals as a PNG line chart.
///
/// The series arrives in chronological order; points are connected in that
/// order. An empty series renders a placeholder image.
pub fn render_trend_chart(series: &[ChartPoint], title: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let scratch = tempfile::Builder::new().suffix(".png").tempfile()?;
    let path = scratch.path().to_path_buf();
    {
        let root = BitMapBackend::new(&path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        if series.is_empty() {
            draw_placeholder(&root)?;
        } else {
            let y_max = axis_max(series);
            let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();

            let mut chart = ChartBuilder::on(&root)
                .caption(title, ("sans-serif", 30).into_font())
                .margin(10)
                .x_label_area_size(60)
                .y_label_area_size(80)
                .build_cartesian_2d(-0.5f64..series.len() as f64 - 0.5, 0f64..y_max)?;

            chart
                .configure_mesh()
                .x_labels(labels.len())
                .x_label_formatter(&|x| label_at(&labels, *x))
                .y_desc("totAmt")
                .draw()?;

            chart.draw_series(LineSeries::new(
                series
                    .iter()
                    .enumerate()
                    .map(|(i, point)| (i as f64, point.total)),
                &BLUE,
            ))?;

            chart.draw_series(
                series
                    .iter()
                    .enumerate()
                    .map(|(i, point)| Circle::new((i as f64, point.total), 4, BLUE.filled())),
            )?;
        }

        root.present()?;
    }

    let png = std::fs::read(&path)?;
    Ok(png)
}

fn draw_placeholder(
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
) -> Result<(), Box<dyn Error>> {
    root.draw(&Text::new(
        "No data to display",
        (
            (CHART_WIDTH / 2 - 100) as i32,
            (CHART_HEIGHT / 2) as i32,
        ),
        ("sans-serif", 24).into_font(),
    ))?;
    Ok(())
}

fn axis_max(series: &[ChartPoint]) -> f64 {
    let max = series.iter().map(|p| p.total).fold(0.0f64, f64::max);
    if max <= 0.0 { 1.0 } else { max * 1.1 }
}

// Continuous axis positions map back to the nearest category index.
fn label_at(labels: &[&str], x: f64) -> String {
    if x < 0.0 {
        return String::new();
    }
    labels
        .get(x.round() as usize)
        .map(|s| s.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Vec<ChartPoint> {
        vec![
            ChartPoint {
                label: "North".to_string(),
                total: 320.0,
            },
            ChartPoint {
                label: "South".to_string(),
                total: 720.0,
            },
        ]
    }

    // PNG files start with an eight-byte signature.
    fn is_png(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
    }

    #[test]
    fn bar_chart_renders_png() {
        let png = render_bar_chart(&series(), "ERO vs Total Amount").unwrap();
        assert!(is_png(&png));
    }

    #[test]
    fn trend_chart_renders_png() {
        let png = render_trend_chart(&series(), "Month-wise Trend").unwrap();
        assert!(is_png(&png));
    }

    #[test]
    fn empty_series_renders_placeholder() {
        let png = render_bar_chart(&[], "ERO vs Total Amount").unwrap();
        assert!(is_png(&png));
    }
}
