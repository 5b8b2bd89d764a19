use std::collections::{BTreeMap, BTreeSet};

/// One parsed row of the size/model table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub tamanho: String,
    pub completos: f64,
    pub moldes: f64,
    pub modelo: String,
}

/// The size/model table with its aggregated quantity matrix.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SizeTable {
    pub rows: Vec<TableRow>,
    pub modelos: Vec<String>,
    pub tamanhos: Vec<String>,
    pub qty_by_modelo: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Locates the size/model table by tolerant header detection and parses
/// its rows until the first malformed line.
///
/// A missing table is not an error; it yields the empty shape.
pub fn parse(text: &str) -> SizeTable {
    let lines = text.lines().collect::<Vec<_>>();
    let Some(header) = find_header(&lines) else {
        return SizeTable::default();
    };

    let mut rows = Vec::new();
    for line in &lines[header + 1..] {
        let Some(row) = parse_row(line) else {
            break;
        };
        rows.push(row);
    }

    aggregate(rows)
}

/// First line containing both "tamanho" and "modelo", with "completo"
/// appearing in the same line or either of the next two (the header may be
/// split across reconstructed lines).
fn find_header(lines: &[&str]) -> Option<usize> {
    for (index, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if !(lower.contains("tamanho") && lower.contains("modelo")) {
            continue;
        }
        let has_completo = (index..lines.len().min(index + 3))
            .any(|i| lines[i].to_lowercase().contains("completo"));
        if has_completo {
            return Some(index);
        }
    }
    None
}

fn parse_row(line: &str) -> Option<TableRow> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() < 4 {
        return None;
    }
    let completos = parse_count(tokens[1])?;
    let moldes = parse_count(tokens[2])?;
    let modelo = tokens[3..].join(" ");
    if modelo.trim().is_empty() {
        return None;
    }
    Some(TableRow {
        tamanho: tokens[0].to_string(),
        completos,
        moldes,
        modelo,
    })
}

fn parse_count(token: &str) -> Option<f64> {
    token
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Sums complete-counts across rows sharing a (modelo, tamanho) pair.
fn aggregate(rows: Vec<TableRow>) -> SizeTable {
    let mut qty_by_modelo: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut modelos = BTreeSet::new();
    let mut tamanhos = BTreeSet::new();

    for row in &rows {
        modelos.insert(row.modelo.clone());
        tamanhos.insert(row.tamanho.clone());
        *qty_by_modelo
            .entry(row.modelo.clone())
            .or_default()
            .entry(row.tamanho.clone())
            .or_insert(0.0) += row.completos;
    }

    SizeTable {
        rows,
        modelos: modelos.into_iter().collect(),
        tamanhos: tamanhos.into_iter().collect(),
        qty_by_modelo,
    }
}
