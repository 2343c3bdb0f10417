use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use toolshare_core::{DurableStoreExt, NotificationOptions, ToolId};

use crate::context::{ToolContext, decode_payload};
use crate::error::{Result, ToolError};

pub const CALENDAR_KEY: &str = "calendar_events";

const TOOL: ToolId = ToolId::Calendar;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stored form: each date maps to a list whose first item is the event shown.
pub type CalendarEvents = BTreeMap<String, Vec<String>>;

#[derive(Deserialize)]
struct UpdatePayload {
    date: String,
    content: String,
}

#[derive(Deserialize)]
struct DeletePayload {
    date: String,
}

/// A calendar month, the unit the month view pages through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    /// 1 = January.
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(text: &str) -> Result<Self> {
        let first = format!("{}-01", text.trim());
        NaiveDate::parse_from_str(&first, DATE_FORMAT)
            .map(|date| Self {
                year: date.year(),
                month: date.month(),
            })
            .map_err(|e| ToolError::invalid_input(TOOL, format!("bad month {text:?}: {e}")))
    }

    pub fn next(self) -> Self {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Self::new(year, month).unwrap_or(self)
    }

    pub fn prev(self) -> Self {
        let (year, month) = if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        };
        Self::new(year, month).unwrap_or(self)
    }

    fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    fn len(self) -> u32 {
        (28..=31)
            .rev()
            .find(|day| NaiveDate::from_ymd_opt(self.year, self.month, *day).is_some())
            .unwrap_or(28)
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub day: u32,
    pub date: String,
    pub event: Option<String>,
}

/// One month laid out for display, weeks starting on Sunday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
    pub month: YearMonth,
    /// Empty cells before the 1st.
    pub leading_blanks: u32,
    pub days: Vec<DayCell>,
}

/// One event per day, keyed by `YYYY-MM-DD`.
#[derive(Debug)]
pub struct CalendarTool {
    ctx: ToolContext,
    events: Arc<Mutex<CalendarEvents>>,
    shown: Mutex<YearMonth>,
}

impl CalendarTool {
    pub fn new(ctx: ToolContext) -> Self {
        let stored: BTreeMap<String, Value> = ctx.load_or_default(TOOL, CALENDAR_KEY);
        let events = Arc::new(Mutex::new(normalize(stored)));

        let remote = Arc::clone(&events);
        ctx.bus.subscribe(TOOL, move |action: &str, payload: &Value| {
            apply_remote(&remote, action, payload);
        });

        Self {
            ctx,
            events,
            shown: Mutex::new(YearMonth::current()),
        }
    }

    /// The month currently paged to, starting at the current month.
    pub fn month_view(&self) -> MonthView {
        let month = *self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        self.view_of(month)
    }

    pub fn show_month(&self, month: YearMonth) -> MonthView {
        *self.shown.lock().unwrap_or_else(PoisonError::into_inner) = month;
        self.view_of(month)
    }

    pub fn next_month(&self) -> MonthView {
        let month = self.page(YearMonth::next);
        self.view_of(month)
    }

    pub fn prev_month(&self) -> MonthView {
        let month = self.page(YearMonth::prev);
        self.view_of(month)
    }

    fn page(&self, step: fn(YearMonth) -> YearMonth) -> YearMonth {
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        *shown = step(*shown);
        *shown
    }

    fn view_of(&self, month: YearMonth) -> MonthView {
        let leading_blanks = month
            .first_day()
            .map_or(0, |first| first.weekday().num_days_from_sunday());
        let events = self.lock();
        let days = (1..=month.len())
            .map(|day| {
                let date = format!("{month}-{day:02}");
                let event = events.get(&date).and_then(|entries| entries.first().cloned());
                DayCell { day, date, event }
            })
            .collect();
        MonthView {
            month,
            leading_blanks,
            days,
        }
    }

    pub fn events(&self) -> CalendarEvents {
        self.lock().clone()
    }

    /// The event shown for `date`, if any.
    pub fn event_on(&self, date: &str) -> Option<String> {
        self.lock().get(date).and_then(|entries| entries.first().cloned())
    }

    pub async fn save(&self, date: &str, content: &str) -> Result<()> {
        let date = parse_date(date)?;
        if content.trim().is_empty() {
            return Err(ToolError::invalid_input(TOOL, "event content is empty"));
        }

        let mut next = self.events();
        next.insert(date.clone(), vec![content.to_string()]);
        self.ctx.store.write_as(CALENDAR_KEY, &next)?;
        *self.lock() = next;

        self.ctx
            .publish(TOOL, "upd", json!({ "date": date, "content": content }));
        self.ctx
            .announce("Event saved", NotificationOptions::body(format!("{date}: {content}")))
            .await;
        Ok(())
    }

    /// Remove the event on `date`. Returns false, doing nothing, when there
    /// is no event that day.
    pub async fn delete(&self, date: &str) -> Result<bool> {
        let date = parse_date(date)?;

        let mut next = self.events();
        if next.remove(&date).is_none() {
            return Ok(false);
        }
        self.ctx.store.write_as(CALENDAR_KEY, &next)?;
        *self.lock() = next;

        self.ctx.publish(TOOL, "del", json!({ "date": date }));
        self.ctx
            .announce("Event deleted", NotificationOptions::body(date))
            .await;
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CalendarEvents> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Canonical `YYYY-MM-DD` form of `date`.
fn parse_date(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map(|parsed| parsed.format(DATE_FORMAT).to_string())
        .map_err(|e| ToolError::invalid_input(TOOL, format!("bad date {date:?}: {e}")))
}

/// Accept both the list form and a bare string per date.
fn normalize(stored: BTreeMap<String, Value>) -> CalendarEvents {
    stored
        .into_iter()
        .filter_map(|(date, entry)| match entry {
            Value::String(content) => Some((date, vec![content])),
            Value::Array(items) => {
                let entries: Vec<String> = items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
                (!entries.is_empty()).then_some((date, entries))
            }
            other => {
                tracing::warn!(date, entry = %other, "Dropping unreadable calendar entry");
                None
            }
        })
        .collect()
}

fn apply_remote(events: &Mutex<CalendarEvents>, action: &str, payload: &Value) {
    match action {
        "upd" => {
            if let Some(UpdatePayload { date, content }) = decode_payload(TOOL, action, payload) {
                events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(date, vec![content]);
            }
        }
        "del" => {
            if let Some(DeletePayload { date }) = decode_payload(TOOL, action, payload) {
                events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&date);
            }
        }
        other => tracing::debug!(action = other, "Ignoring unknown calendar action"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use toolshare_core::test_utils::recording_gateway;
    use toolshare_core::{Bus, DurableStore, InMemoryStore, Origin};

    fn calendar(store: Arc<InMemoryStore>) -> CalendarTool {
        let origin = Origin::default();
        let (bus, _listener) = Bus::connect(&origin);
        let (gateway, _) = recording_gateway();
        CalendarTool::new(ToolContext::new(bus, store, gateway))
    }

    #[rstest]
    #[case("2026-02-30")]
    #[case("tomorrow")]
    #[case("2026/05/01")]
    #[case("")]
    fn rejects_invalid_dates(#[case] date: &str) {
        assert!(matches!(parse_date(date), Err(ToolError::InvalidInput { .. })));
    }

    #[test]
    fn pads_single_digit_month_and_day() {
        assert_eq!(parse_date("2026-5-1").unwrap(), "2026-05-01");
    }

    #[tokio::test]
    async fn save_replaces_the_days_event() {
        let store = Arc::new(InMemoryStore::new());
        let calendar = calendar(store.clone());

        calendar.save("2026-05-01", "holiday").await.unwrap();
        calendar.save("2026-05-01", "picnic").await.unwrap();

        assert_eq!(calendar.event_on("2026-05-01").as_deref(), Some("picnic"));
        assert_eq!(
            store.read(CALENDAR_KEY).unwrap(),
            Some(json!({ "2026-05-01": ["picnic"] }))
        );
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let calendar = calendar(Arc::new(InMemoryStore::new()));

        assert!(calendar.save("2026-05-01", "   ").await.is_err());
        assert!(calendar.events().is_empty());
    }

    #[tokio::test]
    async fn delete_only_acts_on_existing_entries() {
        let store = Arc::new(InMemoryStore::new());
        let calendar = calendar(store.clone());
        calendar.save("2026-05-01", "holiday").await.unwrap();

        assert!(!calendar.delete("2026-06-01").await.unwrap());
        assert!(calendar.delete("2026-05-01").await.unwrap());
        assert_eq!(store.read(CALENDAR_KEY).unwrap(), Some(json!({})));
    }

    #[rstest]
    #[case(2026, 5, 5, 31)]
    #[case(2028, 2, 2, 29)]
    #[case(2026, 2, 0, 28)]
    fn month_view_lays_out_days(
        #[case] year: i32,
        #[case] month: u32,
        #[case] blanks: u32,
        #[case] len: usize,
    ) {
        let calendar = calendar(Arc::new(InMemoryStore::new()));

        let view = calendar.show_month(YearMonth::new(year, month).unwrap());

        assert_eq!(view.leading_blanks, blanks);
        assert_eq!(view.days.len(), len);
        assert_eq!(view.days[0].date, format!("{year:04}-{month:02}-01"));
    }

    #[tokio::test]
    async fn month_view_shows_first_entry_and_pages() {
        let calendar = calendar(Arc::new(InMemoryStore::new()));
        calendar.save("2026-01-15", "dentist").await.unwrap();
        calendar.show_month(YearMonth::new(2025, 12).unwrap());

        let january = calendar.next_month();
        assert_eq!(january.month, YearMonth::new(2026, 1).unwrap());
        assert_eq!(january.days[14].event.as_deref(), Some("dentist"));
        assert_eq!(january.days.iter().filter(|d| d.event.is_some()).count(), 1);

        assert_eq!(calendar.prev_month().month.to_string(), "2025-12");
        assert_eq!(calendar.month_view().month, YearMonth::new(2025, 12).unwrap());
    }

    #[rstest]
    #[case("2026-05", Some((2026, 5)))]
    #[case("2026-5", Some((2026, 5)))]
    #[case("2026-13", None)]
    #[case("May", None)]
    fn parses_months(#[case] text: &str, #[case] expected: Option<(i32, u32)>) {
        let parsed = YearMonth::parse(text).ok().map(|m| (m.year, m.month));
        assert_eq!(parsed, expected);
    }

    #[tokio::test]
    async fn loads_bare_string_entries() {
        let store = Arc::new(InMemoryStore::new());
        store
            .write(
                CALENDAR_KEY,
                &json!({ "2026-01-01": "new year", "2026-01-02": ["work"], "2026-01-03": 7 }),
            )
            .unwrap();

        let calendar = calendar(store);

        assert_eq!(calendar.event_on("2026-01-01").as_deref(), Some("new year"));
        assert_eq!(calendar.event_on("2026-01-02").as_deref(), Some("work"));
        assert_eq!(calendar.event_on("2026-01-03"), None);
    }
}
