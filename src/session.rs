//! Per-connection aggregation state
//!
//! Everything the viewer shows is derived here from the ordered stream of
//! [`AppEvent`]s. The session is owned by one loop and mutated only through
//! [`Session::apply`]; a reader between two calls always sees a complete
//! update. Network work the session needs (the authority set) is requested
//! through returned [`Command`]s and fed back in as events.

use serde::Serialize;
use std::collections::HashMap;

use crate::digest::{DigestDecoder, LeadingU64Slot};
use crate::events::{AggregatedEvent, EventFilter, EventStore};
use crate::leader::LeaderParams;
use crate::types::{AppEvent, AuthorityId, AuxData, BlockHeader};
use crate::util_text::format_number;
use crate::viewport::Viewport;
use crate::window::{BoundedWindow, Height, RoundAuthors};

/// Side effects requested by the session
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch the authority set and session length from the runtime
    FetchAuxData,
    /// Fetch the per-authority points of the current era
    FetchEraPoints,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderRow {
    pub header: BlockHeader,
    pub slot: Option<u64>,
    pub author: Option<AuthorityId>,
}

impl Height for HeaderRow {
    fn height(&self) -> u64 {
        self.header.number
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub keep_headers: usize,
    pub keep_events: usize,
    pub leader: LeaderParams,
    /// Refetch the authority set when the rotation index changes
    pub refresh_on_session_boundary: bool,
    /// Decode unknown engines' pre-runtime payloads as a leading u64
    pub slot_fallback: bool,
    /// Keep the per-author era points tally up to date
    pub track_era_points: bool,
    pub event_filter: EventFilter,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            keep_headers: crate::constants::MAX_HEADERS,
            keep_events: crate::constants::MAX_EVENTS,
            leader: LeaderParams::default(),
            refresh_on_session_boundary: true,
            slot_fallback: false,
            track_era_points: true,
            event_filter: EventFilter::default(),
        }
    }
}

/// Header-side state: recent headers, authors, cached authority set
#[derive(Clone, Debug)]
pub struct HeadState {
    headers: BoundedWindow<HeaderRow>,
    round_authors: RoundAuthors<AuthorityId>,
    last_author: Option<AuthorityId>,
    last_header: Option<HeaderRow>,
    last_number: Option<String>,
    by_author: HashMap<AuthorityId, String>,
    era_points: HashMap<AuthorityId, String>,
    era_in_flight: bool,
    era_backoff: bool,
    aux: Option<AuxData>,
    aux_in_flight: bool,
    last_virtual_step: Option<u64>,
}

impl HeadState {
    fn new(cap: usize) -> Self {
        HeadState {
            headers: BoundedWindow::new(cap),
            round_authors: RoundAuthors::new(cap),
            last_author: None,
            last_header: None,
            last_number: None,
            by_author: HashMap::new(),
            era_points: HashMap::new(),
            era_in_flight: false,
            era_backoff: false,
            aux: None,
            aux_in_flight: false,
            last_virtual_step: None,
        }
    }

    pub fn headers(&self) -> &[HeaderRow] {
        self.headers.items()
    }

    pub fn round_authors(&self) -> &[AuthorityId] {
        self.round_authors.authors()
    }

    pub fn last_author(&self) -> Option<&AuthorityId> {
        self.last_author.as_ref()
    }

    pub fn last_header(&self) -> Option<&HeaderRow> {
        self.last_header.as_ref()
    }

    /// Last observed height, formatted for display (`1,234,567`)
    pub fn last_number(&self) -> Option<&str> {
        self.last_number.as_deref()
    }

    /// Last block (formatted height) each author was seen producing
    pub fn by_author(&self) -> &HashMap<AuthorityId, String> {
        &self.by_author
    }

    /// Points each author has earned in the current era, formatted for display
    pub fn era_points(&self) -> &HashMap<AuthorityId, String> {
        &self.era_points
    }

    pub fn aux(&self) -> Option<&AuxData> {
        self.aux.as_ref()
    }

    pub fn aux_in_flight(&self) -> bool {
        self.aux_in_flight
    }
}

pub struct Session {
    heads: HeadState,
    events: EventStore,
    decoder: DigestDecoder,
    leader: LeaderParams,
    refresh_on_session_boundary: bool,
    track_era_points: bool,
    viewport: Viewport<HeaderRow>,
    quit: bool,
}

impl Session {
    pub fn new(cfg: SessionConfig) -> Self {
        let decoder = if cfg.slot_fallback {
            DigestDecoder::default().with_fallback(Box::new(LeadingU64Slot))
        } else {
            DigestDecoder::default()
        };
        Self::with_decoder(cfg, decoder)
    }

    pub fn with_decoder(cfg: SessionConfig, decoder: DigestDecoder) -> Self {
        Session {
            heads: HeadState::new(cfg.keep_headers),
            events: EventStore::new(cfg.keep_events, cfg.event_filter),
            decoder,
            leader: cfg.leader,
            refresh_on_session_boundary: cfg.refresh_on_session_boundary,
            track_era_points: cfg.track_era_points,
            viewport: Viewport::new(cfg.keep_headers),
            quit: false,
        }
    }

    pub fn apply(&mut self, ev: AppEvent) -> Vec<Command> {
        match ev {
            AppEvent::NewHead(header) => return self.on_head(header),
            AppEvent::AuxData(aux) => {
                log::info!(
                    "authority set loaded: {} authorities, session length {}",
                    aux.authorities.len(),
                    aux.session_length
                );
                self.heads.aux_in_flight = false;
                self.heads.aux = Some(aux);
            }
            AppEvent::AuxDataFailed(err) => {
                log::warn!("authority set fetch failed: {err}");
                self.heads.aux_in_flight = false;
            }
            AppEvent::EraPoints(entries) => {
                self.heads.era_in_flight = false;
                self.on_era_points(entries);
            }
            AppEvent::EraPointsFailed(err) => {
                // Not retried until the next session
                log::warn!("era points fetch failed: {err}");
                self.heads.era_in_flight = false;
                self.heads.era_backoff = true;
            }
            AppEvent::Events(batch) => {
                self.events.apply_batch(&batch);
                log::debug!(
                    "events #{}: {} raw, {} retained",
                    batch.block_number,
                    batch.records.len(),
                    self.events.events().len()
                );
            }
            AppEvent::Quit => self.quit = true,
        }
        Vec::new()
    }

    /// Replace the tally; a change in the number of entries means a new era
    fn on_era_points(&mut self, entries: Vec<(AuthorityId, u32)>) {
        if self.heads.era_points.len() != entries.len() {
            self.heads.era_points.clear();
        }
        for (id, points) in entries {
            self.heads.era_points.insert(id, format_number(u64::from(points)));
        }
    }

    fn request_aux(&mut self, cmds: &mut Vec<Command>) {
        if !self.heads.aux_in_flight {
            self.heads.aux_in_flight = true;
            cmds.push(Command::FetchAuxData);
        }
    }

    fn on_head(&mut self, header: BlockHeader) -> Vec<Command> {
        let mut cmds = Vec::new();
        let slot = self.decoder.slot(&header);

        let mut step_changed = false;
        let author = match (self.heads.aux.as_ref(), slot) {
            (Some(aux), Some(slot)) => {
                let step = self.leader.virtual_step(slot, aux);
                step_changed = step.is_some()
                    && self.heads.last_virtual_step.is_some()
                    && step != self.heads.last_virtual_step;
                if step.is_some() {
                    self.heads.last_virtual_step = step;
                }
                self.leader.author(slot, aux).copied()
            }
            _ => None,
        };
        if self.heads.aux.is_none() || (self.refresh_on_session_boundary && step_changed) {
            self.request_aux(&mut cmds);
        }
        if step_changed {
            self.heads.era_backoff = false;
        }
        if self.track_era_points && !self.heads.era_in_flight && !self.heads.era_backoff {
            self.heads.era_in_flight = true;
            cmds.push(Command::FetchEraPoints);
        }

        let number = header.number;
        log::debug!(
            "head #{number} {} slot={slot:?} author={:?}",
            header.hash,
            author.map(|a| a.short())
        );

        if let Some(a) = author {
            self.heads.by_author.insert(a, format_number(number));
            self.heads.last_author = Some(a);
        }
        self.heads.round_authors.observe(number, author.as_ref());
        self.heads.last_number = Some(format_number(number));

        let row = HeaderRow { header, slot, author };
        self.heads.last_header = Some(row.clone());
        self.heads.headers.insert(row);
        cmds
    }

    pub fn heads(&self) -> &HeadState {
        &self.heads
    }

    pub fn events(&self) -> &[AggregatedEvent] {
        self.events.events()
    }

    pub fn event_count(&self) -> usize {
        self.events.event_count()
    }

    pub fn quit_flag(&self) -> bool {
        self.quit
    }

    // ----- viewport -----
    pub fn pause(&mut self) {
        self.viewport.pause(self.heads.headers.items());
    }

    pub fn resume(&mut self) {
        self.viewport.resume();
    }

    pub fn toggle_order(&mut self) {
        self.viewport.toggle_order();
    }

    pub fn viewport(&self) -> &Viewport<HeaderRow> {
        &self.viewport
    }

    /// Header rows in display order, frozen while paused
    pub fn header_rows(&self) -> Vec<&HeaderRow> {
        self.viewport.rows(self.heads.headers.items())
    }
}

/// Apply `items` in order, collecting every requested command
pub fn fold<I>(mut session: Session, items: I) -> (Session, Vec<Command>)
where
    I: IntoIterator<Item = AppEvent>,
{
    let mut cmds = Vec::new();
    for item in items {
        cmds.extend(session.apply(item));
    }
    (session, cmds)
}
