use anyhow::{anyhow, Context, Result};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

/// One run of text at a page position, in points with the origin at the
/// bottom-left corner of the page.
#[derive(Debug, Clone)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// The decoded text layer of the first page.
#[derive(Debug)]
pub struct PageText {
    pub fragments: Vec<TextFragment>,
    pub width: f32,
    pub height: f32,
}

pub fn decode_first_page(pdf_bytes: &[u8]) -> Result<PageText> {
    let doc = Document::load_mem(pdf_bytes).with_context(|| "failed to parse pdf")?;
    let pages = doc.get_pages();
    let (_, &page_id) = pages
        .iter()
        .next()
        .ok_or_else(|| anyhow!("pdf has no pages"))?;
    let (width, height) = page_size(&doc, page_id)?;
    let fragments = decode_page_fragments(&doc, page_id)?;
    Ok(PageText {
        fragments,
        width,
        height,
    })
}

/// Walks the content stream tracking the text matrix; every text-showing
/// operator emits a fragment at the matrix's current translation.
fn decode_page_fragments(doc: &Document, page_id: ObjectId) -> Result<Vec<TextFragment>> {
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .with_context(|| "failed to read page content stream")?;
    let content =
        Content::decode(&content_data).with_context(|| "failed to decode page content stream")?;

    let mut fragments = Vec::new();
    let mut current_font = String::new();
    let mut current_font_size: f32 = 12.0;
    let mut text_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut line_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut in_text_block = false;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                in_text_block = true;
                text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
            }
            "ET" => {
                in_text_block = false;
            }
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        current_font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = as_number(&op.operands[1]) {
                        current_font_size = size;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = as_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = as_number(&op.operands[1]).unwrap_or(0.0);
                    line_matrix[4] += tx;
                    line_matrix[5] += ty;
                    text_matrix = line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        text_matrix[i] =
                            as_number(operand).unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    line_matrix = text_matrix;
                }
            }
            "T*" => {
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
            }
            "Tj" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Some(text) = decode_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        push_fragment(&mut fragments, text, &text_matrix);
                    }
                }
            }
            "TJ" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let mut combined = String::new();
                        for item in array {
                            if let Some(text) = decode_operand(item, doc, &fonts, &current_font) {
                                combined.push_str(&text);
                            }
                        }
                        push_fragment(&mut fragments, combined, &text_matrix);
                    }
                }
            }
            "'" => {
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
                if !op.operands.is_empty() {
                    if let Some(text) = decode_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        push_fragment(&mut fragments, text, &text_matrix);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(fragments)
}

fn push_fragment(fragments: &mut Vec<TextFragment>, text: String, matrix: &[f32; 6]) {
    if text.trim().is_empty() {
        return;
    }
    fragments.push(TextFragment {
        text,
        x: matrix[4],
        y: matrix[5],
    });
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decodes a string operand through the current font's encoding, falling
/// back to UTF-16BE (BOM-marked) and then Latin-1.
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// MediaBox in points, following the Parent chain when the page inherits it.
fn page_size(doc: &Document, page_id: ObjectId) -> Result<(f32, f32)> {
    let mut dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .with_context(|| "failed to read page dictionary")?;

    loop {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let media_box = resolve(doc, media_box);
            let values = media_box
                .as_array()
                .map_err(|_| anyhow!("MediaBox is not an array"))?
                .iter()
                .filter_map(as_number)
                .collect::<Vec<_>>();
            if values.len() != 4 {
                return Err(anyhow!("MediaBox has {} entries, expected 4", values.len()));
            }
            return Ok(((values[2] - values[0]).abs(), (values[3] - values[1]).abs()));
        }
        match dict.get(b"Parent") {
            Ok(parent) => {
                let id = parent
                    .as_reference()
                    .map_err(|_| anyhow!("page Parent is not a reference"))?;
                dict = doc
                    .get_object(id)
                    .and_then(Object::as_dict)
                    .with_context(|| "failed to read parent page node")?;
            }
            Err(_) => return Err(anyhow!("page has no MediaBox")),
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}
