//! Semicolon-delimited ticket report for spreadsheet tools.
//!
//! Rows are rendered with the `csv` crate using `;` as the delimiter and `\n`
//! terminators, prefixed with a UTF-8 byte-order mark. Free-text fields have
//! line breaks and semicolons replaced with spaces so every ticket stays on
//! one line.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::info;

use super::port_errors::map_ticket_error;
use super::ports::{Notifier, TicketRepository};
use super::{DateWindow, Error, Notification, PartyRef, SessionContext, TicketSummary};

/// Byte-order mark prepended to every report.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header row, in column order.
pub const REPORT_COLUMNS: [&str; 10] = [
    "ID",
    "Title",
    "Description",
    "Status",
    "Requester",
    "Requester email",
    "Technician",
    "Technician email",
    "Created at",
    "Updated at",
];

/// Notification text raised when a window holds no tickets.
pub const EMPTY_REPORT_MESSAGE: &str = "No tickets found for the selected period";

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Inclusive UTC window covering whole local days: `first` from
/// 00:00:00.000 to `last` at 23:59:59.999 in `offset`.
pub fn local_day_window(
    first: NaiveDate,
    last: NaiveDate,
    offset: FixedOffset,
) -> Result<DateWindow, Error> {
    if last < first {
        return Err(Error::invalid_request("end date must not be before start date"));
    }
    let start_of_day = NaiveTime::MIN;
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| Error::internal("invalid end-of-day time"))?;
    let start = local_to_utc(first.and_time(start_of_day), offset)?;
    let end = local_to_utc(last.and_time(end_of_day), offset)?;
    DateWindow::new(Some(start), Some(end)).map_err(|err| Error::invalid_request(err.to_string()))
}

fn local_to_utc(local: chrono::NaiveDateTime, offset: FixedOffset) -> Result<DateTime<Utc>, Error> {
    local
        .and_local_timezone(offset)
        .single()
        .map(|instant| instant.with_timezone(&Utc))
        .ok_or_else(|| Error::invalid_request(format!("{local} is out of range")))
}

/// Date range selected for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWindow {
    first: NaiveDate,
    last: NaiveDate,
    offset: FixedOffset,
    window: DateWindow,
}

impl ExportWindow {
    /// Whole local days from `first` through `last`.
    pub fn new(first: NaiveDate, last: NaiveDate, offset: FixedOffset) -> Result<Self, Error> {
        let window = local_day_window(first, last, offset)?;
        Ok(Self {
            first,
            last,
            offset,
            window,
        })
    }

    /// First local day included.
    pub const fn first(&self) -> NaiveDate {
        self.first
    }

    /// Last local day included.
    pub const fn last(&self) -> NaiveDate {
        self.last
    }

    /// Offset the days are read in.
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// UTC bounds used for the query.
    pub const fn window(&self) -> DateWindow {
        self.window
    }

    /// `tickets_report_<first>_<last>.csv`
    pub fn file_name(&self) -> String {
        format!(
            "tickets_report_{}_{}.csv",
            self.first.format("%Y-%m-%d"),
            self.last.format("%Y-%m-%d")
        )
    }
}

/// Replace line breaks and semicolons with spaces.
pub fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '\n' | '\r' | ';' => ' ',
            other => other,
        })
        .collect()
}

fn format_timestamp(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

fn party_fields(party: Option<&PartyRef>) -> (String, String) {
    party.map_or_else(
        || (String::new(), String::new()),
        |party| {
            (
                sanitize_field(&party.name),
                sanitize_field(party.email.as_deref().unwrap_or_default()),
            )
        },
    )
}

/// Render `tickets` as report bytes, BOM included.
pub fn render_report(tickets: &[TicketSummary], offset: FixedOffset) -> Result<Vec<u8>, Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());
    writer.write_record(REPORT_COLUMNS).map_err(csv_error)?;

    for summary in tickets {
        let ticket = &summary.ticket;
        let (requester, requester_email) = party_fields(summary.requester.as_ref());
        let (technician, technician_email) = party_fields(summary.technician.as_ref());
        writer
            .write_record([
                ticket.id.to_string(),
                sanitize_field(&ticket.title),
                sanitize_field(&ticket.description),
                ticket.status.as_str().to_owned(),
                requester,
                requester_email,
                technician,
                technician_email,
                format_timestamp(ticket.created_at, offset),
                ticket
                    .updated_at
                    .map(|at| format_timestamp(at, offset))
                    .unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|err| Error::internal(format!("failed to flush report: {}", err.error())))
}

fn csv_error(err: csv::Error) -> Error {
    Error::internal(format!("failed to write report row: {err}"))
}

/// Rendered report ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub row_count: usize,
}

/// Exports tickets created in a window.
#[derive(Clone)]
pub struct ReportService<T, N: ?Sized> {
    tickets: Arc<T>,
    notifier: Arc<N>,
    context: Arc<SessionContext>,
}

impl<T, N: ?Sized> ReportService<T, N> {
    /// Report service for the session in `context`.
    pub fn new(tickets: Arc<T>, notifier: Arc<N>, context: Arc<SessionContext>) -> Self {
        Self {
            tickets,
            notifier,
            context,
        }
    }
}

impl<T, N> ReportService<T, N>
where
    T: TicketRepository,
    N: Notifier + ?Sized,
{
    /// Build the report for `window`.
    ///
    /// An empty window produces no report and raises an error notification.
    /// Read failures are notified and returned.
    pub async fn export(&self, window: &ExportWindow) -> Result<Option<TicketReport>, Error> {
        self.context.require_user()?;
        let tickets = match self.tickets.list_in_window(&window.window()).await {
            Ok(tickets) => tickets,
            Err(err) => {
                let mapped = map_ticket_error(err);
                self.notifier.notify(Notification::from(&mapped));
                return Err(mapped);
            }
        };

        if tickets.is_empty() {
            self.notifier.notify(Notification::error(EMPTY_REPORT_MESSAGE));
            return Ok(None);
        }

        let bytes = render_report(&tickets, window.offset())?;
        let report = TicketReport {
            file_name: window.file_name(),
            bytes,
            row_count: tickets.len(),
        };
        info!(file = %report.file_name, rows = report.row_count, "ticket report generated");
        self.notifier
            .notify(Notification::success("Report generated successfully"));
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ticket, TicketId, TicketStatus, UserId};
    use chrono::TimeZone;
    use rstest::rstest;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).expect("valid date")
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("valid offset")
    }

    #[rstest]
    #[case("line one\nline two", "line one line two")]
    #[case("a;b;c", "a b c")]
    #[case("windows\r\nbreak", "windows  break")]
    #[case("plain", "plain")]
    fn sanitize_replaces_breaks_and_semicolons(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_field(raw), expected);
    }

    #[rstest]
    fn day_window_spans_whole_days() {
        let window = local_day_window(date(1), date(2), utc()).expect("valid window");
        let start = Utc
            .with_ymd_and_hms(2024, 2, 1, 0, 0, 0)
            .single()
            .expect("valid");
        assert_eq!(window.start(), Some(start));
        let end = window.end().expect("end bound");
        assert_eq!(end.format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
        assert_eq!(end.date_naive(), date(2));
    }

    #[rstest]
    fn inverted_export_window_is_rejected() {
        let err = ExportWindow::new(date(5), date(4), utc()).expect_err("inverted");
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn file_name_uses_iso_dates() {
        let window = ExportWindow::new(date(1), date(29), utc()).expect("valid");
        assert_eq!(window.file_name(), "tickets_report_2024-02-01_2024-02-29.csv");
    }

    #[rstest]
    fn rendered_report_has_bom_header_and_clean_rows() {
        let created = Utc
            .with_ymd_and_hms(2024, 2, 3, 14, 5, 9)
            .single()
            .expect("valid");
        let summary = TicketSummary {
            ticket: Ticket {
                id: TicketId::random(),
                title: "Email; broken".to_owned(),
                description: "Outlook crashes\nwhen opening; attachments".to_owned(),
                status: TicketStatus::InProgress,
                requester_id: UserId::random(),
                technician_id: None,
                created_at: created,
                updated_at: Some(created),
            },
            requester: Some(PartyRef {
                name: "Ana".to_owned(),
                email: Some("ana@example.com".to_owned()),
            }),
            technician: None,
        };

        let bytes = render_report(&[summary], utc()).expect("render");
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], REPORT_COLUMNS.join(";"));
        let fields: Vec<&str> = lines[1].split(';').collect();
        assert_eq!(fields.len(), REPORT_COLUMNS.len());
        assert_eq!(fields[1], "Email  broken");
        assert_eq!(fields[2], "Outlook crashes when opening  attachments");
        assert_eq!(fields[3], "em_processo");
        assert_eq!(fields[4], "Ana");
        assert_eq!(fields[6], "");
        assert_eq!(fields[8], "03/02/2024, 14:05:09");
    }
}
