use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub mod table;

pub use table::{SizeTable, TableRow};

/// Fields extracted from a cutting-plan page. Every scalar is optional;
/// a document without a label simply yields null for it.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRecord {
    pub tecido: Option<String>,
    pub fator_escala_x: Option<String>,
    pub fator_escala_y: Option<String>,
    pub sentido_unico: Option<String>,
    pub aproveitamento: Option<f64>,
    pub comprimento: Option<f64>,
    pub largura: Option<f64>,
    pub modelo: Option<String>,
    pub descricao: Option<String>,
    pub observacoes: Option<String>,
    pub modelos: Vec<String>,
    pub tamanhos: Vec<String>,
    pub qty_by_modelo: BTreeMap<String, BTreeMap<String, f64>>,
    /// Per-size view, kept for callers that assume a single model. Null
    /// whenever the table has zero or several models.
    pub qty_by_tamanho: Option<BTreeMap<String, f64>>,
}

/// Characters scanned after a scale-factor label before giving up on
/// finding its numeric value.
const SCALE_VALUE_WINDOW: usize = 120;

static RE_TECIDO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:tecido|material)\b[ \t]*:?[ \t]*([^\n]*)").unwrap());
static RE_TIPO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tipo:").unwrap());
static RE_ESCALA_X: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)fator.{0,40}?escala.{0,40}?x\b").unwrap(),
        Regex::new(r"(?i)escala\s*x\b").unwrap(),
    ]
});
static RE_ESCALA_Y: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)fator.{0,40}?escala.{0,40}?y\b").unwrap(),
        Regex::new(r"(?i)escala\s*y\b").unwrap(),
    ]
});
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());
static RE_SENTIDO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sentido\s*[úu]nico\s*[:\-]?\s*(sim|n[ãa]o)").unwrap());
static RE_APROVEITAMENTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)aproveitamento\s*[:\-]?\s*(\d+(?:[.,]\d+)?)\s*%?").unwrap());
static RE_COMPRIMENTO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)comprimento\s*[:\-]?\s*(\d+(?:[.,]\d+)?)").unwrap());
static RE_LARGURA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)largura\s*[:\-]?\s*(\d+(?:[.,]\d+)?)").unwrap());
static RE_MODELO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)modelo[ \t]*:[ \t]*([^\n]+)").unwrap());
static RE_DESCRICAO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)descri[çc][ãa]o[ \t]*:[ \t]*([^\n]+)").unwrap());
static RE_OBSERVACOES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)observa[çc][õo]es[ \t]*:[ \t]*([^\n]+)").unwrap());

/// Applies the label catalogue to reconstructed text. Line-bounded rules
/// (modelo, descrição, observações, tecido) run on the text as-is; the
/// rest run on a flattened copy so labels broken across lines still match.
pub fn extract(text: &str) -> FieldRecord {
    let flat = text.replace('\n', " ");
    let table = table::parse(text);

    let qty_by_tamanho = if table.modelos.len() == 1 {
        table.qty_by_modelo.values().next().cloned()
    } else {
        None
    };

    FieldRecord {
        tecido: extract_tecido(text),
        fator_escala_x: extract_scale(&flat, &RE_ESCALA_X),
        fator_escala_y: extract_scale(&flat, &RE_ESCALA_Y),
        sentido_unico: extract_sentido(&flat),
        aproveitamento: capture_number(&RE_APROVEITAMENTO, &flat),
        comprimento: capture_number(&RE_COMPRIMENTO, &flat),
        largura: capture_number(&RE_LARGURA, &flat),
        modelo: capture_line(&RE_MODELO, text),
        descricao: capture_line(&RE_DESCRICAO, text),
        observacoes: capture_line(&RE_OBSERVACOES, text),
        modelos: table.modelos,
        tamanhos: table.tamanhos,
        qty_by_modelo: table.qty_by_modelo,
        qty_by_tamanho,
    }
}

/// Value between the label and a trailing "Tipo:" section, if any.
fn extract_tecido(text: &str) -> Option<String> {
    let captured = RE_TECIDO.captures(text)?.get(1)?.as_str();
    let value = match RE_TIPO.find(captured) {
        Some(tipo) => &captured[..tipo.start()],
        None => captured,
    };
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// First numeric token within the window after the first label variant
/// that matches; the token is returned verbatim (separator preserved).
fn extract_scale(flat: &str, variants: &[Regex; 2]) -> Option<String> {
    let matched = variants.iter().find_map(|re| re.find(flat))?;
    let window = flat[matched.end()..]
        .chars()
        .take(SCALE_VALUE_WINDOW)
        .collect::<String>();
    RE_NUMBER
        .find(&window)
        .map(|token| token.as_str().to_string())
}

fn extract_sentido(flat: &str) -> Option<String> {
    let value = RE_SENTIDO.captures(flat)?.get(1)?.as_str();
    if value.to_lowercase().starts_with('s') {
        Some("Sim".to_string())
    } else {
        Some("Não".to_string())
    }
}

fn capture_number(re: &Regex, flat: &str) -> Option<f64> {
    let token = re.captures(flat)?.get(1)?.as_str();
    token
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn capture_line(re: &Regex, text: &str) -> Option<String> {
    let value = re.captures(text)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modelo_stops_at_line_break() {
        let record = extract("Modelo: ABC-123\nOutra linha");
        assert_eq!(record.modelo.as_deref(), Some("ABC-123"));
    }

    #[test]
    fn sentido_unico_ignores_trailing_text_on_the_same_line() {
        let record = extract("Sentido único: Sim resto");
        assert_eq!(record.sentido_unico.as_deref(), Some("Sim"));
    }

    #[test]
    fn sentido_unico_normalizes_diacritics() {
        let record = extract("Sentido unico - NAO cortar dobrado");
        assert_eq!(record.sentido_unico.as_deref(), Some("Não"));
    }

    #[test]
    fn absent_labels_yield_null() {
        let record = extract("pagina sem etiquetas conhecidas");
        assert_eq!(record, FieldRecord::default());
    }

    #[test]
    fn tecido_truncates_at_tipo() {
        let record = extract("Tecido: Algodão cru Tipo: Liso");
        assert_eq!(record.tecido.as_deref(), Some("Algodão cru"));
    }

    #[test]
    fn tecido_accepts_material_label() {
        let record = extract("Material: Malha PV");
        assert_eq!(record.tecido.as_deref(), Some("Malha PV"));
    }

    #[test]
    fn tecido_empty_value_is_null() {
        let record = extract("Tecido:\nLargura: 1,80");
        assert_eq!(record.tecido, None);
        assert_eq!(record.largura, Some(1.8));
    }

    #[test]
    fn scale_factor_tolerates_noise_between_label_words() {
        let record = extract("Fator de\nescala X 1,00 Fator de escala Y: 0,98");
        assert_eq!(record.fator_escala_x.as_deref(), Some("1,00"));
        assert_eq!(record.fator_escala_y.as_deref(), Some("0,98"));
    }

    #[test]
    fn scale_factor_abbreviated_variant() {
        let record = extract("Escala X: 2 Escala Y: 3");
        assert_eq!(record.fator_escala_x.as_deref(), Some("2"));
        assert_eq!(record.fator_escala_y.as_deref(), Some("3"));
    }

    #[test]
    fn scale_factor_without_number_in_window_is_null() {
        let record = extract("Fator de escala X sem valor nenhum por aqui");
        assert_eq!(record.fator_escala_x, None);
    }

    #[test]
    fn numeric_fields_accept_comma_separator() {
        let record = extract("Aproveitamento: 82,5%\nComprimento: 4,20\nLargura 1,40");
        assert_eq!(record.aproveitamento, Some(82.5));
        assert_eq!(record.comprimento, Some(4.2));
        assert_eq!(record.largura, Some(1.4));
    }

    #[test]
    fn single_model_table_fills_compat_view() {
        let record = extract(
            "Modelo: VestidoA\nTamanho Modelo Completos Moldes\nM 10 2 VestidoA\nG 5 1 VestidoA",
        );
        assert_eq!(record.modelos, vec!["VestidoA"]);
        assert_eq!(record.tamanhos, vec!["G", "M"]);
        assert_eq!(record.qty_by_modelo["VestidoA"]["M"], 10.0);
        assert_eq!(record.qty_by_modelo["VestidoA"]["G"], 5.0);
        let compat = record.qty_by_tamanho.expect("single model view");
        assert_eq!(compat["M"], 10.0);
        assert_eq!(compat["G"], 5.0);
    }

    #[test]
    fn multi_model_table_leaves_compat_view_null() {
        let record = extract(
            "Tamanho Modelo Completos Moldes\nM 10 2 VestidoA\nG 5 1 CalcaB",
        );
        assert_eq!(record.modelos, vec!["CalcaB", "VestidoA"]);
        assert_eq!(record.qty_by_tamanho, None);
    }
}
