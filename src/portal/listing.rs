//! Parse the portal's search page into edition records.
//!
//! Each edition is a table row holding a `javascript:downloadWindow('<path>')`
//! link; the first cell is the edition number and the second the date.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

static RE_DOWNLOAD_JS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"downloadWindow\('([^']+)'\)").unwrap());

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static DOWNLOAD_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="downloadWindow"]"#).unwrap());

/// One gazette edition listed on the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edition {
    /// `<numero>_<clean date>`, the registry key.
    pub id: String,
    /// Absolute download URL.
    pub url: String,
    /// `PR_diario_<numero>_<clean date>.pdf`
    pub filename: String,
    pub numero: String,
    pub edition_number: u32,
    /// Date as shown on the portal.
    pub data: String,
}

impl Edition {
    /// Build an edition from the listing cells and the download path.
    pub fn new(numero: &str, data: &str, download_path: &str, base_url: &str) -> Option<Self> {
        let edition_number = match numero.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                warn!("Ignoring edition with non-numeric number: '{}'", numero);
                return None;
            }
        };
        let clean = clean_date(data);
        Some(Self {
            id: format!("{numero}_{clean}"),
            url: format!("{}{}", base_url.trim_end_matches('/'), download_path),
            filename: format!("PR_diario_{numero}_{clean}.pdf"),
            numero: numero.to_string(),
            edition_number,
            data: data.to_string(),
        })
    }
}

/// `10/01/2023` → `10_01_2023`; `-` and spaces become `_` too.
pub fn clean_date(data: &str) -> String {
    data.replace(['/', '-', ' '], "_")
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Every edition row of a listing page, in page order, without duplicates.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<Edition> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut editions = Vec::new();

    for row in document.select(&ROW) {
        let Some(link) = row.select(&DOWNLOAD_LINK).next() else {
            continue;
        };
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }
        let numero = cell_text(&cells[0]);
        let data = cell_text(&cells[1]);
        if numero.is_empty() || data.is_empty() {
            continue;
        }
        let href = link.value().attr("href").unwrap_or_default();
        let Some(path) = RE_DOWNLOAD_JS.captures(href).map(|c| c[1].to_string()) else {
            continue;
        };
        if let Some(edition) = Edition::new(&numero, &data, &path, base_url) {
            if seen.insert(edition.id.clone()) {
                editions.push(edition);
            }
        }
    }

    editions
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://portal.tjpr.jus.br";

    const PAGE: &str = r#"
        <html><body><table>
          <tr><th>Edição</th><th>Data</th><th></th></tr>
          <tr>
            <td> 3851 </td><td>10/01/2023</td>
            <td><a href="javascript:downloadWindow('/e-dj/publico/diario/baixar.do?id=1')">PDF</a></td>
          </tr>
          <tr>
            <td>3850</td><td>09/01/2023</td>
            <td><a href="javascript:downloadWindow('/e-dj/publico/diario/baixar.do?id=2')">PDF</a></td>
          </tr>
          <tr><td>extra</td><td>09/01/2023</td><td><a href="/outra">x</a></td></tr>
          <tr>
            <td>ABC</td><td>08/01/2023</td>
            <td><a href="javascript:downloadWindow('/x')">PDF</a></td>
          </tr>
        </table></body></html>"#;

    #[test]
    fn parses_edition_rows() {
        let editions = parse_listing(PAGE, BASE);
        assert_eq!(editions.len(), 2);

        let e = &editions[0];
        assert_eq!(e.numero, "3851");
        assert_eq!(e.edition_number, 3851);
        assert_eq!(e.data, "10/01/2023");
        assert_eq!(e.id, "3851_10_01_2023");
        assert_eq!(e.filename, "PR_diario_3851_10_01_2023.pdf");
        assert_eq!(
            e.url,
            "https://portal.tjpr.jus.br/e-dj/publico/diario/baixar.do?id=1"
        );
    }

    #[test]
    fn empty_page_has_no_editions() {
        assert!(parse_listing("<html><body>sem resultados</body></html>", BASE).is_empty());
    }

    #[test]
    fn clean_date_replaces_separators() {
        assert_eq!(clean_date("2023-01-10"), "2023_01_10");
        assert_eq!(clean_date("10/01/2023 08h"), "10_01_2023_08h");
    }
}
