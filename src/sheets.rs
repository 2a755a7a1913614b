//! Writing rows into a Google spreadsheet

pub mod auth;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::{
    error::{snippet, SheetsError},
    secrets::Credentials,
};

/// A single worksheet (tab) of a spreadsheet
pub trait Worksheet {
    /// True when the worksheet holds no values at all
    fn is_empty(&self) -> Result<bool, SheetsError>;

    /// Appends `rows` after the last row with data, in one request
    fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<(), SheetsError>;
}

pub trait SpreadsheetService {
    type Worksheet: Worksheet;

    /// Authorizes with `creds`, opens the spreadsheet by key and selects its first worksheet
    fn open_first_worksheet(
        &self,
        creds: &Credentials,
        spreadsheet_id: &str,
    ) -> Result<Self::Worksheet, SheetsError>;
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetInfo>,
}

#[derive(Debug, Deserialize)]
struct SheetInfo {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Google Sheets v4 REST client
#[derive(Debug, Clone)]
pub struct GoogleSheets {
    http: Client,
    base_url: String,
}

impl GoogleSheets {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl SpreadsheetService for GoogleSheets {
    type Worksheet = RemoteWorksheet;

    fn open_first_worksheet(
        &self,
        creds: &Credentials,
        spreadsheet_id: &str,
    ) -> Result<RemoteWorksheet, SheetsError> {
        let token = auth::access_token(&self.http, creds)?;

        let mut url = endpoint(&self.base_url, &["v4", "spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let res = self.http.get(url).bearer_auth(&token).send()?;
        let spreadsheet: Spreadsheet = success(res)?.json()?;

        let title = spreadsheet
            .sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or_else(|| SheetsError::NoWorksheet(spreadsheet_id.to_owned()))?;
        debug!(spreadsheet = spreadsheet_id, worksheet = %title, "opened worksheet");

        Ok(RemoteWorksheet {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            spreadsheet_id: spreadsheet_id.to_owned(),
            range: quote_title(&title),
            token,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RemoteWorksheet {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    token: String,
}

impl RemoteWorksheet {
    fn values_url(&self, range: &str) -> Result<Url, SheetsError> {
        endpoint(
            &self.base_url,
            &["v4", "spreadsheets", &self.spreadsheet_id, "values", range],
        )
    }
}

impl Worksheet for RemoteWorksheet {
    fn is_empty(&self) -> Result<bool, SheetsError> {
        let url = self.values_url(&self.range)?;
        let res = self.http.get(url).bearer_auth(&self.token).send()?;
        let values: ValueRange = success(res)?.json()?;

        Ok(values.values.iter().all(|row| row.is_empty()))
    }

    fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
        let mut url = self.values_url(&format!("{}:append", self.range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let count = rows.len();
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()?;
        success(res)?;

        debug!(rows = count, range = %self.range, "appended rows");
        Ok(())
    }
}

/// A1 notation for a whole worksheet
fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, SheetsError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| SheetsError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn success(res: Response) -> Result<Response, SheetsError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    Err(SheetsError::Status {
        status,
        body: snippet(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_titles() {
        assert_eq!(quote_title("Blad1"), "'Blad1'");
        assert_eq!(quote_title("Q1 'CJ'"), "'Q1 ''CJ'''");
    }

    #[test]
    fn builds_append_path() {
        let url = endpoint(
            "http://localhost:1234/",
            &["v4", "spreadsheets", "abc", "values", "'Blad 1':append"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:1234/v4/spreadsheets/abc/values/'Blad%201':append"
        );
    }

    #[test]
    fn bad_base_url() {
        assert!(matches!(
            endpoint("not a url", &["v4"]),
            Err(SheetsError::Url(_))
        ));
    }
}
