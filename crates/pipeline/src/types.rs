//! Shared value types for the Digest pipeline domain.
//!
//! Raw types (`RawCommit`, `RawMessage`, `RegistryEntry`) are what the record
//! sources hand over; normalised types (`ActivityRecord`, `GroupedRecords`)
//! are what every downstream stage consumes. Normalised records are immutable
//! once produced: fields are private and only exposed through accessors.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, ChannelId, Cursor};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// The Unix epoch. Used as the placeholder time of records whose source
    /// omitted a timestamp, so they sort first.
    pub fn epoch() -> Self {
        Self(DateTime::UNIX_EPOCH)
    }

    /// Parses a Slack-style `"<seconds>.<micros>"` timestamp.
    ///
    /// Returns `None` for anything that is not a non-negative decimal number.
    pub fn from_unix_str(value: &str) -> Option<Self> {
        let (secs, frac) = match value.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (value, ""),
        };
        let secs: i64 = secs.parse().ok()?;
        if secs < 0 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // Right-pad the fraction to nanoseconds, ignoring anything beyond.
        let nanos = format!("{:0<9}", frac.chars().take(9).collect::<String>());
        let nanos: u32 = nanos.parse().ok()?;
        DateTime::from_timestamp(secs, nanos).map(Self)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Whole seconds since the Unix epoch.
    pub fn unix_seconds(self) -> i64 {
        self.0.timestamp()
    }

    /// Returns this timestamp moved back by `duration`, saturating at the epoch.
    pub fn saturating_sub(self, duration: Duration) -> Self {
        self.0
            .checked_sub_signed(duration)
            .map(Self)
            .unwrap_or_else(Self::epoch)
            .max(Self::epoch())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Pipeline kinds
// ---------------------------------------------------------------------------

/// The three pipelines the coordinator runs. Each kind is its own
/// exclusivity domain: a run of one never blocks a run of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Daily source-control commit digest.
    Commits,
    /// Weekly chat-channel history digest.
    ChannelHistory,
    /// On-demand contact registry lookup (fan-out, one message per match).
    Lookup,
}

impl PipelineKind {
    /// Every pipeline kind, in a stable order.
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Commits,
        PipelineKind::ChannelHistory,
        PipelineKind::Lookup,
    ];

    /// Short name used in logs, configuration and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineKind::Commits => "commits",
            PipelineKind::ChannelHistory => "channel",
            PipelineKind::Lookup => "lookup",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known [`PipelineKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pipeline '{0}' (expected commits, channel or lookup)")]
pub struct UnknownPipelineKind(pub String);

impl std::str::FromStr for PipelineKind {
    type Err = UnknownPipelineKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commits" | "commit" => Ok(PipelineKind::Commits),
            "channel" | "channel-history" | "messages" => Ok(PipelineKind::ChannelHistory),
            "lookup" => Ok(PipelineKind::Lookup),
            other => Err(UnknownPipelineKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Who or what asked for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOrigin {
    /// A periodic schedule fired. Nobody is waiting on the result.
    Scheduled,
    /// A chat slash command. The invoker is acknowledged in `reply_channel`
    /// and told about delivery failures there.
    Command(CommandContext),
    /// A local one-shot invocation (the CLI `run` subcommand).
    Manual {
        /// Free-text arguments; the lookup query for lookup runs.
        text: String,
    },
}

impl TriggerOrigin {
    /// Free-text arguments carried by the trigger, empty for scheduled runs.
    pub fn text(&self) -> &str {
        match self {
            TriggerOrigin::Scheduled => "",
            TriggerOrigin::Command(ctx) => &ctx.text,
            TriggerOrigin::Manual { text } => text,
        }
    }

    /// The channel an on-demand invoker is waiting in, if any.
    pub fn reply_channel(&self) -> Option<&ChannelId> {
        match self {
            TriggerOrigin::Command(ctx) => Some(&ctx.reply_channel),
            _ => None,
        }
    }
}

/// Details of an inbound slash command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandContext {
    /// The user who issued the command, when the platform reported one.
    pub user: Option<ActorId>,
    /// Channel the command was issued from; acknowledgements go here.
    pub reply_channel: ChannelId,
    /// Free-text arguments following the command name.
    pub text: String,
}

/// One request to run a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub kind: PipelineKind,
    pub origin: TriggerOrigin,
}

impl TriggerEvent {
    pub fn scheduled(kind: PipelineKind) -> Self {
        Self {
            kind,
            origin: TriggerOrigin::Scheduled,
        }
    }

    pub fn command(kind: PipelineKind, context: CommandContext) -> Self {
        Self {
            kind,
            origin: TriggerOrigin::Command(context),
        }
    }

    pub fn manual(kind: PipelineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            origin: TriggerOrigin::Manual { text: text.into() },
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch bounds
// ---------------------------------------------------------------------------

/// Bounds one record-source call.
///
/// `max_records` is a hard cap on how many raw records a source may return;
/// sources that paginate derive their page budget from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchWindow {
    lookback: Duration,
    max_records: usize,
    cursor: Option<Cursor>,
}

impl FetchWindow {
    /// Creates a window reaching `lookback` into the past, capped at
    /// `max_records`.
    pub fn new(lookback: Duration, max_records: usize) -> Self {
        Self {
            lookback,
            max_records,
            cursor: None,
        }
    }

    /// Starts pagination from `cursor` instead of the newest page.
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// The oldest instant covered by the window: `now - lookback`.
    pub fn since(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.lookback)
    }

    /// Upper bound on page fetches: `ceil(max_records / page_size)`.
    pub fn max_pages(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.max_records.div_ceil(page_size)
    }
}

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// A commit as returned by the source-control collaborator. Every field other
/// than the SHA may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCommit {
    pub sha: String,
    pub author_name: Option<String>,
    pub message: Option<String>,
    pub authored_at: Option<Timestamp>,
    pub url: Option<String>,
}

/// A chat message as returned by the channel-history collaborator.
///
/// `display_name` is filled in by the record source after identity
/// resolution; the history API itself only reports `user`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMessage {
    pub ts: String,
    pub user: Option<ActorId>,
    pub text: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    pub thread_ts: Option<String>,
    pub display_name: Option<String>,
}

/// One page of channel history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub messages: Vec<RawMessage>,
    /// Absent (or empty) when the upstream has no further pages.
    pub next_cursor: Option<Cursor>,
}

/// The output of a time-windowed record source, tagged by origin.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecords {
    Commits(Vec<RawCommit>),
    Messages(Vec<RawMessage>),
}

impl RawRecords {
    pub fn len(&self) -> usize {
        match self {
            RawRecords::Commits(c) => c.len(),
            RawRecords::Messages(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Normalised records
// ---------------------------------------------------------------------------

/// Source-specific extras carried alongside a record (commit SHA, message ts).
pub type SourceMeta = BTreeMap<String, String>;

/// One normalised activity event: a commit or a top-level chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    actor: String,
    body: String,
    occurred_at: Timestamp,
    origin_url: Option<String>,
    source_meta: SourceMeta,
}

impl ActivityRecord {
    pub fn new(actor: impl Into<String>, body: impl Into<String>, occurred_at: Timestamp) -> Self {
        Self {
            actor: actor.into(),
            body: body.into(),
            occurred_at,
            origin_url: None,
            source_meta: SourceMeta::new(),
        }
    }

    pub fn with_origin_url(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.source_meta.insert(key.into(), value.into());
        self
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// First line of the body, used wherever a one-line title is needed.
    pub fn headline(&self) -> &str {
        self.body.lines().next().unwrap_or("").trim()
    }

    pub fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    pub fn origin_url(&self) -> Option<&str> {
        self.origin_url.as_deref()
    }

    pub fn source_meta(&self) -> &SourceMeta {
        &self.source_meta
    }
}

/// All records of a single actor, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorGroup {
    actor: String,
    records: Vec<ActivityRecord>,
}

impl ActorGroup {
    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Records partitioned by actor.
///
/// Built only through [`GroupedRecords::from_records`], which guarantees that
/// every record of a group shares the group's actor, that each input record
/// lands in exactly one group, and that groups are chronological. Groups are
/// ordered by the time of each actor's first record so rendering is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedRecords {
    groups: Vec<ActorGroup>,
}

impl GroupedRecords {
    pub fn from_records(mut records: Vec<ActivityRecord>) -> Self {
        // Stable: records with equal timestamps keep their input order.
        records.sort_by_key(|r| r.occurred_at);

        let mut groups: Vec<ActorGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in records {
            match index.get(&record.actor) {
                Some(&i) => groups[i].records.push(record),
                None => {
                    index.insert(record.actor.clone(), groups.len());
                    groups.push(ActorGroup {
                        actor: record.actor.clone(),
                        records: vec![record],
                    });
                }
            }
        }
        Self { groups }
    }

    pub fn groups(&self) -> &[ActorGroup] {
        &self.groups
    }

    pub fn group(&self, actor: &str) -> Option<&ActorGroup> {
        self.groups.iter().find(|g| g.actor == actor)
    }

    /// Every record, group by group.
    pub fn records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.groups.iter().flat_map(|g| g.records.iter())
    }

    /// Total number of records across all groups.
    pub fn total(&self) -> usize {
        self.groups.iter().map(ActorGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Why no summary text is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Summarisation is switched off for this pipeline.
    Disabled,
    /// No generative-text credential is configured.
    MissingCredential,
    /// There was nothing to summarise.
    EmptyInput,
    /// The generative-text call failed; the failure has been logged.
    Failed,
}

/// Outcome of the enrichment stage. Never an empty string standing in for
/// "nothing available".
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentResult {
    Text(String),
    Unavailable(UnavailableReason),
}

impl EnrichmentResult {
    pub fn text(&self) -> Option<&str> {
        match self {
            EnrichmentResult::Text(t) => Some(t),
            EnrichmentResult::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, EnrichmentResult::Text(_))
    }
}

// ---------------------------------------------------------------------------
// Contact registry
// ---------------------------------------------------------------------------

/// One row of the contact registry, keyed by column header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryEntry {
    fields: BTreeMap<String, String>,
}

impl RegistryEntry {
    pub const COMPANY: &'static str = "Company";
    pub const PERSON: &'static str = "Person";
    pub const RANKING: &'static str = "Ranking";
    pub const LAST_CONTACTED: &'static str = "Last contacted";
    pub const NOTES: &'static str = "Notes";
    pub const TYPE: &'static str = "Type";
    pub const STATUS: &'static str = "Status";

    /// Builds an entry from `(header, cell)` pairs. Keys and values are trimmed.
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into().trim().to_string()))
                .collect(),
        }
    }

    /// The value of `key`, or `None` when the column is missing or blank.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// A registry entry together with its match score (0.0 is a perfect match).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: RegistryEntry,
    pub score: f64,
}

/// Ranked result of one registry query, best match first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSet {
    query: String,
    matches: Vec<ScoredEntry>,
}

impl MatchSet {
    /// Creates a match set; `matches` must already be in rank order.
    pub fn new(query: impl Into<String>, matches: Vec<ScoredEntry>) -> Self {
        Self {
            query: query.into(),
            matches,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[ScoredEntry] {
        &self.matches
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.matches.iter().map(|m| &m.entry)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap())
    }

    #[test]
    fn test_from_unix_str_parses_slack_timestamps() {
        let ts = Timestamp::from_unix_str("1700000000.000200").expect("valid ts");
        assert_eq!(ts.unix_seconds(), 1_700_000_000);
        assert_eq!(ts.as_datetime().timestamp_subsec_micros(), 200);

        assert!(Timestamp::from_unix_str("1700000000").is_some());
        assert!(Timestamp::from_unix_str("abc").is_none());
        assert!(Timestamp::from_unix_str("-5.0").is_none());
        assert!(Timestamp::from_unix_str("12.x").is_none());
    }

    #[test]
    fn test_fetch_window_since_and_page_budget() {
        let window = FetchWindow::new(Duration::hours(24), 1000);
        let now = at(12);
        assert_eq!(window.since(now).as_datetime(), now.as_datetime() - Duration::hours(24));
        assert_eq!(window.max_pages(100), 10);
        assert_eq!(FetchWindow::new(Duration::hours(1), 101).max_pages(100), 2);
        assert_eq!(FetchWindow::new(Duration::hours(1), 0).max_pages(100), 0);
    }

    #[test]
    fn test_grouping_is_chronological_and_lossless() {
        let records = vec![
            ActivityRecord::new("Bob", "b1", at(9)),
            ActivityRecord::new("Alice", "a2", at(11)),
            ActivityRecord::new("Alice", "a1", at(8)),
        ];
        let grouped = GroupedRecords::from_records(records);

        assert_eq!(grouped.total(), 3);
        let actors: Vec<&str> = grouped.groups().iter().map(|g| g.actor()).collect();
        assert_eq!(actors, vec!["Alice", "Bob"]);

        let alice: Vec<&str> = grouped
            .group("Alice")
            .expect("alice group")
            .records()
            .iter()
            .map(|r| r.body())
            .collect();
        assert_eq!(alice, vec!["a1", "a2"]);
        assert!(grouped
            .groups()
            .iter()
            .all(|g| g.records().iter().all(|r| r.actor() == g.actor())));
    }

    #[test]
    fn test_pipeline_kind_round_trips_through_str() {
        for kind in PipelineKind::ALL {
            assert_eq!(kind.as_str().parse::<PipelineKind>(), Ok(kind));
        }
        assert!("weekly".parse::<PipelineKind>().is_err());
    }

    #[test]
    fn test_registry_entry_blank_fields_are_absent() {
        let entry = RegistryEntry::from_fields([("Company", " Acme "), ("Notes", "  ")]);
        assert_eq!(entry.field(RegistryEntry::COMPANY), Some("Acme"));
        assert_eq!(entry.field(RegistryEntry::NOTES), None);
        assert_eq!(entry.field(RegistryEntry::PERSON), None);
    }
}
