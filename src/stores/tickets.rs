use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::api::api_types::{TicketCreateData, TicketUpdateData};
use crate::api::tickets::TicketService;
use crate::api::types::Ticket;
use crate::cache::{CacheSource, CollectionCache, KeyValueStore};

use super::track;

/// Tickets, cached locally and mirrored from the API when it is reachable.
pub struct TicketStore<S: KeyValueStore + ?Sized> {
  cache: CollectionCache<S>,
  tickets: Vec<Ticket>,
  loading: bool,
  error: Option<String>,
}

impl<S: KeyValueStore + ?Sized> TicketStore<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      cache: CollectionCache::new(storage),
      tickets: Vec::new(),
      loading: false,
      error: None,
    }
  }

  pub fn tickets(&self) -> &[Ticket] {
    &self.tickets
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn find(&self, id: &str) -> Option<&Ticket> {
    self.tickets.iter().find(|t| t.id == id)
  }

  /// Tickets created by or assigned to `user_id`.
  pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Ticket> + 'a {
    self
      .tickets
      .iter()
      .filter(move |t| t.assigned_to == user_id || t.created_by == user_id)
  }

  /// Load from cache, seeding the mock tickets when it is empty.
  pub fn fetch(&mut self) -> Result<&[Ticket]> {
    let loaded = self.cache.load::<Ticket>();
    let loaded = track(&mut self.error, "failed to load tickets", loaded)?;
    self.tickets = loaded.data;
    Ok(&self.tickets)
  }

  /// Replace the list with the backend's when it answers; otherwise keep what
  /// the cache (or the mock dataset) provides.
  pub async fn refresh(&mut self, service: &TicketService<S>) -> Result<CacheSource> {
    self.loading = true;
    let fetched = service.fetch_all().await;
    self.loading = false;

    match fetched {
      Ok(tickets) => {
        self.tickets = tickets;
        let saved = self.persist();
        track(&mut self.error, "failed to save tickets", saved)?;
        Ok(CacheSource::Network)
      }
      Err(e) => {
        tracing::warn!(error = %e, "ticket list unavailable, using cached tickets");
        let loaded = self.cache.load::<Ticket>();
        let loaded = track(&mut self.error, "failed to load tickets", loaded)?;
        self.tickets = loaded.data;
        Ok(loaded.source)
      }
    }
  }

  /// Create a ticket locally, without the API.
  pub fn add(&mut self, data: &TicketCreateData, created_by: &str) -> Result<Ticket> {
    let now = Utc::now();
    let ticket = Ticket {
      id: self.local_id(now),
      title: data.title.clone(),
      description: data.description.clone(),
      status: "open".to_string(),
      priority: data.priority.clone(),
      category: data.category.clone(),
      created_by: created_by.to_string(),
      assigned_to: String::new(),
      created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
      updated_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    self.tickets.push(ticket.clone());

    let saved = self.persist();
    track(&mut self.error, "failed to add ticket", saved)?;
    tracing::info!(id = %ticket.id, "ticket added locally");
    Ok(ticket)
  }

  /// Apply `changes` to the ticket with `id`.
  pub fn update(&mut self, id: &str, changes: &TicketUpdateData) -> Result<Ticket> {
    let result = self.modify(id, |ticket| apply_update(ticket, changes));
    track(&mut self.error, "failed to update ticket", result)
  }

  /// Set the status field; any string is accepted.
  pub fn set_status(&mut self, id: &str, status: &str) -> Result<Ticket> {
    let result = self.modify(id, |ticket| ticket.status = status.to_string());
    track(&mut self.error, "failed to update ticket status", result)
  }

  /// Assign to `user_id`, moving the ticket to "assigned".
  pub fn assign(&mut self, id: &str, user_id: &str) -> Result<Ticket> {
    let result = self.modify(id, |ticket| {
      ticket.assigned_to = user_id.to_string();
      ticket.status = "assigned".to_string();
    });
    track(&mut self.error, "failed to assign ticket", result)
  }

  /// Remove the ticket with `id`. Unknown ids are ignored.
  pub fn delete(&mut self, id: &str) -> Result<()> {
    let before = self.tickets.len();
    self.tickets.retain(|t| t.id != id);
    if self.tickets.len() == before {
      return Ok(());
    }

    let saved = self.persist();
    track(&mut self.error, "failed to delete ticket", saved)
  }

  /// Store a record returned by the API, replacing any ticket with its id.
  pub fn upsert(&mut self, ticket: Ticket) -> Result<()> {
    match self.tickets.iter_mut().find(|t| t.id == ticket.id) {
      Some(existing) => *existing = ticket,
      None => self.tickets.push(ticket),
    }
    let saved = self.persist();
    track(&mut self.error, "failed to save ticket", saved)
  }

  /// `TICKET-YYYYMMDDHHMMSS`, suffixed with `-2`, `-3`... when a ticket created
  /// in the same second already holds the id.
  fn local_id(&self, now: DateTime<Utc>) -> String {
    let base = format!("TICKET-{}", now.format("%Y%m%d%H%M%S"));
    let mut id = base.clone();
    let mut n = 1;
    while self.find(&id).is_some() {
      n += 1;
      id = format!("{}-{}", base, n);
    }
    id
  }

  fn modify<F>(&mut self, id: &str, change: F) -> Result<Ticket>
  where
    F: FnOnce(&mut Ticket),
  {
    let ticket = self
      .tickets
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| eyre!("Ticket {} not found", id))?;

    change(ticket);
    ticket.updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let updated = ticket.clone();

    self.persist()?;
    Ok(updated)
  }

  fn persist(&self) -> Result<()> {
    self.cache.save(&self.tickets)
  }
}

fn apply_update(ticket: &mut Ticket, changes: &TicketUpdateData) {
  let fields = [
    (&mut ticket.title, &changes.title),
    (&mut ticket.description, &changes.description),
    (&mut ticket.status, &changes.status),
    (&mut ticket.priority, &changes.priority),
    (&mut ticket.category, &changes.category),
    (&mut ticket.assigned_to, &changes.assigned_to),
  ];
  for (field, change) in fields {
    if let Some(value) = change {
      field.clone_from(value);
    }
  }
}
