use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::signal::{Snapshot, StreamError};
use crate::types::ChannelId;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub trace: RGBColor,
    /// Fixed vertical range; samples outside it are clipped.
    pub y_range: (f64, f64),
    /// Draw a "Lead n" caption. Needs a system sans-serif font.
    pub caption: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 720,
            height: 240,
            background: WHITE,
            trace: RGBColor(0, 128, 0),
            y_range: (-2.0, 2.0),
            caption: true,
        }
    }
}
/// One lead of a snapshot as a PNG strip.
pub fn render_lead_png(
    snapshot: &Snapshot,
    id: ChannelId,
    style: &PlotStyle,
) -> Result<Vec<u8>, StreamError> {
    let samples = snapshot.channel(id);
    if samples.is_empty() {
        return Err(StreamError::Plot(format!("{id} has no samples")));
    }
    if style.width == 0 || style.height == 0 {
        return Err(StreamError::Plot("plot dimensions must be non-zero".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.caption {
            builder.caption(id.to_string(), ("sans-serif", 16).into_font().color(&BLACK));
        }
        let mut chart = builder.build_cartesian_2d(
            0f64..samples.len() as f64,
            style.y_range.0..style.y_range.1,
        )?;
        let series = samples.iter().enumerate().map(|(i, v)| (i as f64, *v));
        chart.draw_series(LineSeries::new(series, style.trace.stroke_width(1)))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
/// Every lead of a snapshot, in channel order.
pub fn render_snapshot_pngs(
    snapshot: &Snapshot,
    style: &PlotStyle,
) -> Result<Vec<(ChannelId, Vec<u8>)>, StreamError> {
    ChannelId::all()
        .map(|id| render_lead_png(snapshot, id, style).map(|png| (id, png)))
        .collect()
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, StreamError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| StreamError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
