use crate::models::FieldTable;
use crate::scraper::error::ScrapeError;
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use scraper::{ElementRef, Html, Selector};

static TABLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("Failed to compile TABLE_SEL"));
static ROW_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Failed to compile ROW_SEL"));

// ── Tables ────────────────────────────────────────────────────────────────────

/// One `<table>` as whitespace-collapsed cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// First column as label, second as value. Rows with fewer than two cells are skipped.
    pub fn field_table(&self) -> FieldTable {
        self.rows
            .iter()
            .filter(|cells| cells.len() >= 2)
            .map(|cells| (cells[0].clone(), cells[1].clone()))
            .collect()
    }
}

/// Every table in document order, empty ones included so that positional
/// indexes match the page. `None` when the document has no `<table>` at all.
pub fn extract_tables(doc: &Html) -> Option<Vec<HtmlTable>> {
    let tables: Vec<HtmlTable> = doc.select(&TABLE_SEL).map(read_table).collect();
    if tables.is_empty() { None } else { Some(tables) }
}

fn read_table(table: ElementRef<'_>) -> HtmlTable {
    let mut out = HtmlTable::default();

    for tr in table
        .select(&ROW_SEL)
        .filter(|tr| belongs_to(tr, &table))
    {
        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .collect();
        if cells.is_empty() {
            continue;
        }

        let text: Vec<String> = cells.iter().map(cell_text).collect();
        let in_thead = tr
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| p.value().name() == "thead");
        let all_th = cells.iter().all(|c| c.value().name() == "th");

        if in_thead || (all_th && out.header.is_empty() && out.rows.is_empty()) {
            if out.header.is_empty() {
                out.header = text;
            }
            continue;
        }

        if text.iter().all(|t| t.is_empty()) {
            continue;
        }
        out.rows.push(text);
    }

    out
}

/// Rows of nested tables belong to the innermost enclosing `<table>`.
fn belongs_to(tr: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    tr.ancestors()
        .find(|n| n.value().as_element().is_some_and(|e| e.name() == "table"))
        .is_some_and(|n| n.id() == table.id())
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<&str>>()
        .join(" ")
}

// ── RawDocument ───────────────────────────────────────────────────────────────

/// A fetched page. The DOM and the table list are built on first use.
pub struct RawDocument {
    html: String,
    tree: OnceCell<Html>,
    tables: OnceCell<Option<Vec<HtmlTable>>>,
}

impl RawDocument {
    pub fn parse(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            tree: OnceCell::new(),
            tables: OnceCell::new(),
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Error-tolerant parse; malformed markup never fails.
    pub fn tree(&self) -> &Html {
        self.tree.get_or_init(|| Html::parse_document(&self.html))
    }

    pub fn tables(&self) -> Option<&[HtmlTable]> {
        self.tables
            .get_or_init(|| extract_tables(self.tree()))
            .as_deref()
    }

    /// Trimmed text of the first element matching `selector`.
    pub fn select_text(&self, selector: &Selector) -> Option<String> {
        self.tree()
            .select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }

    /// Outer HTML of every element matching `selector`.
    pub fn select_html(&self, selector: &Selector) -> Vec<String> {
        self.tree().select(selector).map(|el| el.html()).collect()
    }

    /// Pair `tag.class_a` texts with `tag.class_b` texts by position.
    ///
    /// Both sequences are collected in document order with empty texts
    /// dropped, then zipped. Whitespace-only texts are not empty: they keep
    /// their slot and are stored trimmed. Nothing checks that a label sits next to its
    /// value: if one side has extra entries the pairs shift, and the excess of
    /// the longer side is discarded.
    pub fn paired_text(
        &self,
        tag: &str,
        class_a: &str,
        class_b: &str,
    ) -> Result<FieldTable, ScrapeError> {
        let labels = self.class_texts(tag, class_a)?;
        let values = self.class_texts(tag, class_b)?;
        Ok(labels.into_iter().zip(values).collect())
    }

    fn class_texts(&self, tag: &str, class: &str) -> Result<Vec<String>, ScrapeError> {
        let css = format!("{tag}[class~=\"{class}\"]");
        let selector = Selector::parse(&css)
            .map_err(|e| ScrapeError::parse(format!("selector {css}: {e:?}")))?;

        Ok(self
            .tree()
            .select(&selector)
            .map(|el| el.text().collect::<String>())
            .filter(|t| !t.is_empty())
            .map(|t| t.trim().to_string())
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
