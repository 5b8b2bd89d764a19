use anyhow::Result;
use tracing::debug;

pub mod crop;
pub mod fields;
pub mod layout;
pub mod logging;
pub mod pdftext;
mod render;
pub mod server;
pub mod settings;

/// Anchor positions below this fraction of the page height mean the label
/// sits in the footer region, so the crop likely needs the footer-rule
/// correction.
const ANCHOR_FOOTER_FRAC: f32 = 0.28;

/// The result of processing one cutting-plan PDF.
#[derive(Debug)]
pub struct Extraction {
    pub fields: fields::FieldRecord,
    pub image_data_url: String,
}

/// Runs the whole pipeline on one document: decode the text layer,
/// rebuild reading order, extract the field record, render the page, and
/// crop the diagram region. Any stage failure aborts the request; there
/// are no partial results.
pub fn process_pdf(pdf_bytes: &[u8], settings: &settings::Settings) -> Result<Extraction> {
    let page = pdftext::decode_first_page(pdf_bytes)?;
    debug!(
        "decoded {} fragments from a {:.0}x{:.0}pt page",
        page.fragments.len(),
        page.width,
        page.height
    );
    let reconstructed = layout::reconstruct(&page.fragments, page.width, page.height);
    let fields = fields::extract(&reconstructed.text);

    let dpi = settings.render_dpi;
    let target_height = reconstructed.anchor_y.map(|anchor_y| {
        let px = ((page.height - anchor_y) as f64 * dpi as f64 / 72.0).floor() as i64
            - settings.crop_margin as i64;
        px.max(0) as u32
    });
    let footer_likely = reconstructed
        .anchor_y
        .map(|anchor_y| anchor_y < page.height * ANCHOR_FOOTER_FRAC)
        .unwrap_or(false);
    debug!(
        "anchor at {:?}pt, target height {:?}px, footer likely {}",
        reconstructed.anchor_y, target_height, footer_likely
    );

    let bitmap = render::render_first_page(pdf_bytes, dpi, settings.render_command.as_deref())?;
    let bounds = crop::detect_bounds(
        &bitmap,
        target_height,
        footer_likely,
        settings.fallback_crop_height,
    );
    debug!("crop bounds {:?} on {:?} bitmap", bounds, bitmap.dimensions());
    let cropped = crop::crop_image(&bitmap, &bounds);
    let image_data_url = crop::encode_png_data_url(&cropped)?;

    Ok(Extraction {
        fields,
        image_data_url,
    })
}
