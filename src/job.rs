//! The fetch, transform and append pipeline

use chrono::{Local, NaiveDate};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::{
    commissions::{CommissionSource, CommissionsClient, DATE_FORMAT},
    config::{Endpoints, JobConfig},
    data::SheetRow,
    error::{FetchError, JobError},
    secrets::{SecretManagerClient, SecretStore},
    sheets::{GoogleSheets, SpreadsheetService, Worksheet},
};

pub const NO_TRANSACTIONS: &str = "Inga transaktioner för gårdagen.";

pub const STATUS_OK: u16 = 200;
pub const STATUS_FAILED: u16 = 500;

/// Message and HTTP status reported for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub message: String,
    pub status: u16,
}

impl JobOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: STATUS_OK,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: STATUS_FAILED,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// The day before `today`, `None` for the first representable date
pub fn yesterday(today: NaiveDate) -> Option<NaiveDate> {
    today.pred_opt()
}

pub struct TransferJob<S, C, W> {
    config: JobConfig,
    secrets: S,
    commissions: C,
    sheets: W,
}

pub type HttpTransferJob = TransferJob<SecretManagerClient, CommissionsClient, GoogleSheets>;

impl HttpTransferJob {
    /// Builds a job against the real services
    pub fn from_config(config: JobConfig, endpoints: &Endpoints) -> Result<Self, JobError> {
        let http = Client::builder().build().map_err(JobError::Transport)?;

        Ok(TransferJob::new(
            SecretManagerClient::new(http.clone(), &endpoints.secret_manager, &endpoints.metadata),
            CommissionsClient::new(http.clone(), &endpoints.commissions, &config.api_token),
            GoogleSheets::new(http, &endpoints.sheets),
            config,
        ))
    }
}

impl<S, C, W> TransferJob<S, C, W>
where
    S: SecretStore,
    C: CommissionSource,
    W: SpreadsheetService,
{
    pub fn new(secrets: S, commissions: C, sheets: W, config: JobConfig) -> Self {
        Self {
            config,
            secrets,
            commissions,
            sheets,
        }
    }

    /// Transfers yesterday's commissions, by the local clock
    pub fn run(&self) -> Result<JobOutcome, JobError> {
        self.run_for(Local::now().date_naive())
    }

    /// Transfers the commissions of the day before `today`.
    ///
    /// Upstream status and parse failures of the commissions API are
    /// reported as a 500 outcome, every other failure is returned as
    /// an error. Rows are appended as-is: running twice for the same
    /// day writes them twice.
    pub fn run_for(&self, today: NaiveDate) -> Result<JobOutcome, JobError> {
        let creds = self
            .secrets
            .credentials(&self.config.project_id, &self.config.secret_name)?;

        let date = yesterday(today).ok_or(JobError::NoPreviousDay(today))?;
        info!(date = %date.format(DATE_FORMAT), "fetching commissions");

        let records = match self.commissions.fetch(date) {
            Ok(records) => records,
            Err(FetchError::Transport(e)) => return Err(JobError::Transport(e)),
            Err(FetchError::Status { status, body }) => {
                warn!(status = status.as_u16(), "commissions API returned an error");
                return Ok(JobOutcome::failed(format!(
                    "CJ API svarade med status {}: {body}",
                    status.as_u16()
                )));
            }
            Err(FetchError::Parse { body }) => {
                warn!("commissions API returned invalid JSON");
                return Ok(JobOutcome::failed(format!(
                    "Kunde inte tolka svaret från CJ API: {body}"
                )));
            }
        };

        let rows: Vec<SheetRow> = records.iter().map(SheetRow::from).collect();
        if rows.is_empty() {
            info!("no commissions for the day");
            return Ok(JobOutcome::ok(NO_TRANSACTIONS));
        }

        let count = rows.len();
        let worksheet = self
            .sheets
            .open_first_worksheet(&creds, &self.config.sheet_id)?;

        let mut batch = Vec::with_capacity(count + 1);
        if worksheet.is_empty()? {
            debug!("worksheet is empty, writing header");
            batch.push(SheetRow::header().into_cells());
        }
        batch.extend(rows.into_iter().map(SheetRow::into_cells));

        worksheet.append_rows(batch)?;
        info!(rows = count, "commissions written");

        Ok(JobOutcome::ok(format!("{count} rader inskrivna.")))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use reqwest::StatusCode;

    use super::*;
    use crate::{
        data::CommissionRecord,
        error::{SecretError, SheetsError},
        secrets::Credentials,
    };

    const KEY: &str = r#"{"client_email":"job@proj.iam.gserviceaccount.com","private_key":"pem"}"#;

    struct FakeSecrets(Option<&'static str>);

    impl SecretStore for FakeSecrets {
        fn access_latest(&self, _: &str, _: &str) -> Result<String, SecretError> {
            self.0.map(str::to_owned).ok_or(SecretError::NoPayload)
        }
    }

    enum Upstream {
        Body(&'static str),
        Status(StatusCode, String),
        Unreachable,
    }

    struct FakeApi {
        upstream: Upstream,
        requested: RefCell<Vec<NaiveDate>>,
    }

    impl FakeApi {
        fn body(body: &'static str) -> Self {
            Self {
                upstream: Upstream::Body(body),
                requested: RefCell::default(),
            }
        }

        fn status(status: StatusCode, body: impl Into<String>) -> Self {
            Self {
                upstream: Upstream::Status(status, body.into()),
                requested: RefCell::default(),
            }
        }

        fn unreachable() -> Self {
            Self {
                upstream: Upstream::Unreachable,
                requested: RefCell::default(),
            }
        }
    }

    impl CommissionSource for FakeApi {
        fn fetch(&self, date: NaiveDate) -> Result<Vec<CommissionRecord>, FetchError> {
            self.requested.borrow_mut().push(date);
            match &self.upstream {
                Upstream::Body(body) => crate::commissions::parse_commissions(body),
                Upstream::Status(status, body) => Err(FetchError::Status {
                    status: *status,
                    body: crate::error::snippet(body),
                }),
                // an unparsable url fails in the client without any network traffic
                Upstream::Unreachable => Err(FetchError::Transport(
                    reqwest::blocking::get("not a url").unwrap_err(),
                )),
            }
        }
    }

    /// In-memory sheet shared between opened worksheets
    #[derive(Clone, Default)]
    struct FakeSheet {
        rows: Rc<RefCell<Vec<Vec<String>>>>,
        append_calls: Rc<RefCell<usize>>,
        opened: Rc<RefCell<usize>>,
    }

    impl Worksheet for FakeSheet {
        fn is_empty(&self) -> Result<bool, SheetsError> {
            Ok(self.rows.borrow().is_empty())
        }

        fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
            *self.append_calls.borrow_mut() += 1;
            self.rows.borrow_mut().extend(rows);
            Ok(())
        }
    }

    impl SpreadsheetService for FakeSheet {
        type Worksheet = FakeSheet;

        fn open_first_worksheet(&self, creds: &Credentials, id: &str) -> Result<FakeSheet, SheetsError> {
            assert_eq!(creds.key.client_email, "job@proj.iam.gserviceaccount.com");
            assert_eq!(id, "sheet-1");
            *self.opened.borrow_mut() += 1;
            Ok(self.clone())
        }
    }

    fn config() -> JobConfig {
        JobConfig::new("proj", "sheets-sa", "sheet-1", "token").unwrap()
    }

    fn job(api: FakeApi, sheet: FakeSheet) -> TransferJob<FakeSecrets, FakeApi, FakeSheet> {
        TransferJob::new(FakeSecrets(Some(KEY)), api, sheet, config())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    const TWO: &str = r#"{"commissions":[
        {"eventDate":"2024-02-29","country":"SE","advertiserName":"Acme","commissionAmount":"12.50","orderId":"X1"},
        {"eventDate":"2024-02-29","country":"NO","advertiserName":"Nordic","commissionAmount":3,"orderId":"X2"}
    ]}"#;

    #[test]
    fn yesterday_crosses_month_and_leap_day() {
        assert_eq!(yesterday(today()), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(
            yesterday(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
    }

    #[test]
    fn first_representable_day_has_no_yesterday() {
        assert_eq!(yesterday(NaiveDate::MIN), None);

        let sheet = FakeSheet::default();
        let job = job(FakeApi::body(TWO), sheet.clone());

        assert!(matches!(
            job.run_for(NaiveDate::MIN),
            Err(JobError::NoPreviousDay(day)) if day == NaiveDate::MIN
        ));
        assert!(job.commissions.requested.borrow().is_empty());
        assert_eq!(*sheet.opened.borrow(), 0);
    }

    #[test]
    fn unreachable_api_is_fatal() {
        let sheet = FakeSheet::default();
        let job = job(FakeApi::unreachable(), sheet.clone());

        assert!(matches!(job.run_for(today()), Err(JobError::Transport(_))));
        assert_eq!(job.commissions.requested.borrow().len(), 1);
        assert_eq!(*sheet.opened.borrow(), 0);
        assert_eq!(*sheet.append_calls.borrow(), 0);
    }

    #[test]
    fn requests_previous_day() {
        let job = job(FakeApi::body(r#"{"commissions":[]}"#), FakeSheet::default());
        job.run_for(today()).unwrap();
        assert_eq!(
            *job.commissions.requested.borrow(),
            vec![NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()]
        );
    }

    #[test]
    fn writes_header_then_rows_into_empty_sheet() {
        let sheet = FakeSheet::default();
        let outcome = job(FakeApi::body(TWO), sheet.clone()).run_for(today()).unwrap();

        assert_eq!(outcome, JobOutcome::ok("2 rader inskrivna."));
        assert_eq!(*sheet.append_calls.borrow(), 1);
        assert_eq!(
            *sheet.rows.borrow(),
            vec![
                vec!["Datum", "Marknad", "Annonsör", "Kostnad", "Order ID"],
                vec!["2024-02-29", "SE", "Acme", "12.50", "X1"],
                vec!["2024-02-29", "NO", "Nordic", "3", "X2"],
            ]
        );
    }

    #[test]
    fn skips_header_when_sheet_has_rows() {
        let sheet = FakeSheet::default();
        sheet.rows.borrow_mut().push(vec!["existing".to_owned()]);

        let outcome = job(FakeApi::body(TWO), sheet.clone()).run_for(today()).unwrap();

        assert_eq!(outcome.message, "2 rader inskrivna.");
        let rows = sheet.rows.borrow();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][4], "X1");
        assert_eq!(rows[2][4], "X2");
    }

    #[test]
    fn no_transactions_leaves_sheet_untouched() {
        for body in [r#"{"commissions":[]}"#, r#"{}"#] {
            let sheet = FakeSheet::default();
            let outcome = job(FakeApi::body(body), sheet.clone()).run_for(today()).unwrap();

            assert_eq!(outcome, JobOutcome::ok(NO_TRANSACTIONS));
            assert_eq!(*sheet.opened.borrow(), 0);
            assert_eq!(*sheet.append_calls.borrow(), 0);
        }
    }

    #[test]
    fn upstream_error_status_is_reported() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::NOT_FOUND, StatusCode::BAD_GATEWAY] {
            let sheet = FakeSheet::default();
            let outcome = job(FakeApi::status(status, "denied"), sheet.clone())
                .run_for(today())
                .unwrap();

            assert_eq!(outcome.status, STATUS_FAILED);
            assert!(outcome.message.contains(&status.as_u16().to_string()));
            assert!(outcome.message.contains("denied"));
            assert_eq!(*sheet.opened.borrow(), 0);
        }
    }

    #[test]
    fn upstream_error_body_is_truncated() {
        let body = "e".repeat(2000);
        let outcome = job(FakeApi::status(StatusCode::INTERNAL_SERVER_ERROR, body), FakeSheet::default())
            .run_for(today())
            .unwrap();

        assert_eq!(outcome.status, STATUS_FAILED);
        assert!(outcome.message.contains(&"e".repeat(500)));
        assert!(!outcome.message.contains(&"e".repeat(501)));
    }

    #[test]
    fn malformed_json_is_reported_with_body() {
        let outcome = job(FakeApi::body("<html>Service Unavailable</html>"), FakeSheet::default())
            .run_for(today())
            .unwrap();

        assert_eq!(outcome.status, STATUS_FAILED);
        assert!(outcome.message.contains("<html>Service Unavailable</html>"));
    }

    #[test]
    fn missing_secret_is_fatal() {
        let sheet = FakeSheet::default();
        let job = TransferJob::new(FakeSecrets(None), FakeApi::body(TWO), sheet.clone(), config());

        assert!(matches!(job.run_for(today()), Err(JobError::Secret(_))));
        assert!(job.commissions.requested.borrow().is_empty());
        assert_eq!(*sheet.append_calls.borrow(), 0);
    }

    #[test]
    fn unparsable_secret_is_fatal() {
        let job = TransferJob::new(
            FakeSecrets(Some("{")),
            FakeApi::body(TWO),
            FakeSheet::default(),
            config(),
        );
        assert!(matches!(
            job.run_for(today()),
            Err(JobError::Secret(SecretError::Parse(_)))
        ));
    }

    #[test]
    fn rerun_duplicates_rows() {
        let sheet = FakeSheet::default();
        let job = job(FakeApi::body(TWO), sheet.clone());

        job.run_for(today()).unwrap();
        job.run_for(today()).unwrap();

        let rows = sheet.rows.borrow();
        // one header, then the same two rows twice
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[1], rows[3]);
        assert_eq!(rows[2], rows[4]);
        assert_eq!(*sheet.append_calls.borrow(), 2);
    }
}
