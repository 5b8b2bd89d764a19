use std::collections::HashMap;

use crate::pdftext::TextFragment;

/// Label whose page position anchors the diagram/footer split.
const ANCHOR_SUBSTRING: &str = "tecido";

/// The text layer rebuilt into reading order.
///
/// `anchor_y` is the unquantized y of the first fragment, in scan order,
/// whose text contains the anchor label. Scan order is fragment emission
/// order, so with out-of-order emission this may not be the visually first
/// occurrence on the page.
#[derive(Debug)]
pub struct ReconstructedText {
    pub text: String,
    pub anchor_y: Option<f32>,
    pub page_width: f32,
    pub page_height: f32,
}

/// Groups positioned fragments into visual lines and orders them
/// top-to-bottom, left-to-right.
///
/// Fragments sharing a y bucket (nearest 0.5 pt) form one line. Fragments
/// on visually distinct lines that round into the same bucket are merged;
/// that approximation is accepted.
pub fn reconstruct(
    fragments: &[TextFragment],
    page_width: f32,
    page_height: f32,
) -> ReconstructedText {
    let mut anchor_y = None;
    let mut buckets: HashMap<i64, Vec<(f32, String)>> = HashMap::new();

    for fragment in fragments {
        let text = fragment.text.replace('\u{00a0}', " ");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if anchor_y.is_none() && text.to_lowercase().contains(ANCHOR_SUBSTRING) {
            anchor_y = Some(fragment.y);
        }
        buckets
            .entry(quantize(fragment.y))
            .or_default()
            .push((fragment.x, text.to_string()));
    }

    let mut keys = buckets.keys().copied().collect::<Vec<_>>();
    keys.sort_unstable_by(|a, b| b.cmp(a));

    let mut lines = Vec::new();
    for key in keys {
        let mut entries = buckets.remove(&key).unwrap_or_default();
        entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let joined = entries
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let line = joined.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }

    ReconstructedText {
        text: lines.join("\n"),
        anchor_y,
        page_width,
        page_height,
    }
}

/// Nearest 0.5 pt bucket.
fn quantize(y: f32) -> i64 {
    (y * 2.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str, x: f32, y: f32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x,
            y,
        }
    }

    #[test]
    fn orders_single_line_by_x_regardless_of_input_order() {
        let fragments = vec![
            fragment("mundo", 120.0, 700.0),
            fragment("ola", 40.0, 700.0),
            fragment("grande", 80.0, 700.2),
        ];
        let permuted = vec![
            fragments[2].clone(),
            fragments[0].clone(),
            fragments[1].clone(),
        ];

        let a = reconstruct(&fragments, 595.0, 842.0);
        let b = reconstruct(&permuted, 595.0, 842.0);
        assert_eq!(a.text, "ola grande mundo");
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn orders_lines_top_to_bottom() {
        let fragments = vec![
            fragment("rodape", 10.0, 30.0),
            fragment("titulo", 10.0, 800.0),
            fragment("meio", 10.0, 400.0),
        ];
        let result = reconstruct(&fragments, 595.0, 842.0);
        assert_eq!(result.text, "titulo\nmeio\nrodape");
    }

    #[test]
    fn records_first_anchor_in_scan_order() {
        let fragments = vec![
            fragment("Tecido: Algodao", 10.0, 120.0),
            fragment("tecido especial", 10.0, 500.0),
        ];
        let result = reconstruct(&fragments, 595.0, 842.0);
        assert_eq!(result.anchor_y, Some(120.0));
    }

    #[test]
    fn normalizes_nbsp_and_drops_empty_fragments() {
        let fragments = vec![
            fragment("\u{00a0}\u{00a0}", 10.0, 700.0),
            fragment("a\u{00a0}b", 20.0, 700.0),
        ];
        let result = reconstruct(&fragments, 595.0, 842.0);
        assert_eq!(result.text, "a b");
        assert_eq!(result.anchor_y, None);
    }

    #[test]
    fn merges_fragments_rounding_into_one_bucket() {
        let fragments = vec![
            fragment("esquerda", 10.0, 500.1),
            fragment("direita", 90.0, 499.9),
        ];
        let result = reconstruct(&fragments, 595.0, 842.0);
        assert_eq!(result.text, "esquerda direita");
    }
}
