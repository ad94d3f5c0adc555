//! Command-line subcommands and their handlers.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};

use crate::api::api_types::{RegisterRequest, TicketCreateData, TicketUpdateData};
use crate::api::client::is_unreachable;
use crate::api::types::{Category, Role, Ticket, User};
use crate::app::App;
use crate::cache::CacheSource;
use crate::config::Config;
use crate::stores::ProfileUpdate;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Log in and cache the session
  Login {
    email: String,
    /// Password (default: $GROWDESK_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,
  },
  /// Create an account and log into it
  Register {
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// Password (default: $GROWDESK_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,
  },
  /// Forget the cached session
  Logout,
  /// Show the logged-in user
  Whoami {
    /// Ask the backend instead of the cache
    #[arg(long, conflicts_with = "refresh")]
    remote: bool,
    /// Re-read the profile from the cached user directory
    #[arg(long)]
    refresh: bool,
  },
  /// Edit your own profile
  Profile {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    department: Option<String>,
  },
  /// Show session and cache state
  Status,
  /// Browse and edit tickets
  #[command(subcommand)]
  Tickets(TicketCommand),
  /// Manage ticket categories
  #[command(subcommand)]
  Categories(CategoryCommand),
  /// Browse the user directory
  #[command(subcommand)]
  Users(UserCommand),
}

#[derive(Subcommand, Debug)]
pub enum TicketCommand {
  /// List tickets
  List {
    /// Only tickets assigned to me
    #[arg(long, conflicts_with = "live")]
    mine: bool,
    /// Show the API's answer as is, without reading or updating the cache
    #[arg(long)]
    live: bool,
  },
  /// Show one ticket
  Show { id: String },
  /// Open a new ticket
  Create {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "MEDIUM")]
    priority: String,
    #[arg(long, default_value = "")]
    category: String,
  },
  /// Change ticket fields
  Update {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    priority: Option<String>,
    #[arg(long)]
    category: Option<String>,
  },
  /// Set the ticket status
  Status { id: String, status: String },
  /// Assign the ticket to a user
  Assign { id: String, user_id: String },
  /// Delete a ticket
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
  List,
  Add {
    name: String,
    #[arg(long, default_value = "")]
    description: String,
  },
  Update {
    id: u64,
    name: String,
    #[arg(long, default_value = "")]
    description: String,
  },
  Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  List,
  /// Add a user to the local directory
  Add {
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, default_value = "employee")]
    role: Role,
    #[arg(long)]
    department: Option<String>,
  },
  /// Change a user's role in the local directory
  Role { id: String, role: Role },
  /// Remove a user from the local directory
  Delete { id: String },
}

pub async fn execute(app: &mut App, command: Command) -> Result<()> {
  match command {
    Command::Login { email, password } => {
      let password = password_or_env(password)?;
      let route = app.login(&email, &password).await?;
      println!("Logged in as {}", app.session().full_name());
      println!("Next: {}", route.path());
    }
    Command::Register {
      email,
      first_name,
      last_name,
      password,
    } => {
      let request = RegisterRequest {
        email,
        password: password_or_env(password)?,
        first_name,
        last_name,
      };
      let route = app.register(request).await?;
      println!("Registered {}", app.session().full_name());
      println!("Next: {}", route.path());
    }
    Command::Logout => {
      let route = app.logout();
      println!("Logged out. Next: {}", route.path());
    }
    Command::Whoami { remote, refresh } => {
      if remote {
        app.require_user()?;
        print_user(&app.remote_profile().await?);
      } else if refresh {
        print_user(app.reload_profile()?);
      } else {
        match app.session().user() {
          Some(user) if app.session().is_authenticated() => print_user(user),
          _ => println!("Not logged in"),
        }
      }
    }
    Command::Profile {
      email,
      first_name,
      last_name,
      department,
    } => {
      let user = app.update_profile(ProfileUpdate {
        email,
        first_name,
        last_name,
        department,
      })?;
      print_user(user);
    }
    Command::Status => print_status(app)?,
    Command::Tickets(command) => execute_tickets(app, command).await?,
    Command::Categories(command) => execute_categories(app, command)?,
    Command::Users(command) => execute_users(app, command).await?,
  }
  Ok(())
}

async fn execute_users(app: &mut App, command: UserCommand) -> Result<()> {
  app.require_user()?;

  match command {
    UserCommand::List => {
      let service = app.users_service();
      let source = app.users().refresh(&service).await?;
      note_source(source);
      for user in app.users().users() {
        println!(
          "{:<6} {:<30} {:<24} {}",
          user.id,
          user.email,
          user.full_name(),
          user.role
        );
      }
    }
    UserCommand::Add {
      email,
      first_name,
      last_name,
      role,
      department,
    } => {
      if !app.session().is_admin() {
        return Err(eyre!("Only administrators can add users"));
      }
      app.users().fetch()?;
      let user = app.users().add(User {
        id: String::new(),
        email,
        first_name,
        last_name,
        role,
        department,
        active: Some(true),
      })?;
      println!("Added user {} ({})", user.full_name(), user.id);
    }
    UserCommand::Role { id, role } => {
      if !app.session().is_admin() {
        return Err(eyre!("Only administrators can change roles"));
      }
      app.users().fetch()?;
      let mut user = app
        .users()
        .find(&id)
        .cloned()
        .ok_or_else(|| eyre!("User {} not found", id))?;
      user.role = role;
      let user = app.users().update(user)?;
      println!("{} is now {}", user.full_name(), user.role);
    }
    UserCommand::Delete { id } => {
      if !app.session().is_admin() {
        return Err(eyre!("Only administrators can delete users"));
      }
      app.users().fetch()?;
      app.users().delete(&id)?;
      println!("Deleted user {}", id);
    }
  }
  Ok(())
}

async fn execute_tickets(app: &mut App, command: TicketCommand) -> Result<()> {
  let me = app.require_user()?.id.clone();
  let service = app.ticket_service();

  match command {
    TicketCommand::List { live: true, .. } => {
      let result = service.get_all_tickets().await?;
      note_source(result.source);
      print_tickets(&result.data);
    }
    TicketCommand::List { mine: false, .. } => {
      let source = app.refresh_tickets().await?;
      note_source(source);
      print_tickets(app.tickets().tickets());
    }
    TicketCommand::List { mine: true, .. } => match service.get_user_tickets(&me).await {
      Ok(result) => {
        note_source(result.source);
        print_tickets(&result.data);
      }
      Err(e) => {
        tracing::warn!(error = %e, "user tickets unavailable, using cached tickets");
        note_source(CacheSource::Cache);
        app.tickets().fetch()?;
        let mine: Vec<Ticket> = app.tickets().for_user(&me).cloned().collect();
        print_tickets(&mine);
      }
    },
    TicketCommand::Show { id } => {
      let ticket = match service.get_ticket(&id).await {
        Ok(result) => {
          note_source(result.source);
          result.data
        }
        Err(e) => {
          note_source(CacheSource::Cache);
          app.tickets().fetch()?;
          app
            .tickets()
            .find(&id)
            .cloned()
            .ok_or_else(|| eyre!("Ticket {} not found: {}", id, e))?
        }
      };
      print_ticket(&ticket);
    }
    TicketCommand::Create {
      title,
      description,
      priority,
      category,
    } => {
      let data = TicketCreateData {
        title,
        description,
        priority,
        category,
      };
      app.tickets().fetch()?;
      let ticket = match service.create_ticket(&data).await {
        Ok(ticket) => {
          app.tickets().upsert(ticket.clone())?;
          ticket
        }
        Err(e) if is_unreachable(&e) => {
          eprintln!("API unavailable ({}); ticket saved locally", e);
          app.tickets().add(&data, &me)?
        }
        Err(e) => return Err(e),
      };
      println!("Created {}", ticket.id);
    }
    TicketCommand::Update {
      id,
      title,
      description,
      priority,
      category,
    } => {
      let changes = TicketUpdateData {
        title,
        description,
        priority,
        category,
        ..Default::default()
      };
      if changes.is_empty() {
        return Err(eyre!("Nothing to update"));
      }
      app.tickets().fetch()?;
      let ticket = match service.update_ticket(&id, &changes).await {
        Ok(ticket) => {
          app.tickets().upsert(ticket.clone())?;
          ticket
        }
        Err(e) if is_unreachable(&e) => {
          eprintln!("API unavailable ({}); change saved locally", e);
          app.tickets().update(&id, &changes)?
        }
        Err(e) => return Err(e),
      };
      print_ticket(&ticket);
    }
    TicketCommand::Status { id, status } => {
      app.tickets().fetch()?;
      let ticket = match service.update_ticket_status(&id, &status).await {
        Ok(ticket) => {
          app.tickets().upsert(ticket.clone())?;
          ticket
        }
        Err(e) if is_unreachable(&e) => {
          eprintln!("API unavailable ({}); change saved locally", e);
          app.tickets().set_status(&id, &status)?
        }
        Err(e) => return Err(e),
      };
      println!("{} is now {}", ticket.id, ticket.status);
    }
    TicketCommand::Assign { id, user_id } => {
      if app.session().is_employee() {
        return Err(eyre!("Only administrators and assistants can assign tickets"));
      }
      app.tickets().fetch()?;
      let ticket = match service.assign_ticket(&id, &user_id).await {
        Ok(ticket) => {
          app.tickets().upsert(ticket.clone())?;
          ticket
        }
        Err(e) if is_unreachable(&e) => {
          eprintln!("API unavailable ({}); change saved locally", e);
          app.tickets().assign(&id, &user_id)?
        }
        Err(e) => return Err(e),
      };
      println!("{} assigned to {}", ticket.id, ticket.assigned_to);
    }
    TicketCommand::Delete { id } => {
      app.tickets().fetch()?;
      match service.delete_ticket(&id).await {
        Ok(()) => {}
        Err(e) if is_unreachable(&e) => eprintln!("API unavailable ({}); deleted locally", e),
        Err(e) => return Err(e),
      }
      app.tickets().delete(&id)?;
      println!("Deleted {}", id);
    }
  }
  Ok(())
}

fn execute_categories(app: &mut App, command: CategoryCommand) -> Result<()> {
  match command {
    CategoryCommand::List => print_categories(app.categories().categories()),
    CategoryCommand::Add { name, description } => {
      app.require_user()?;
      let category = app.categories().add(&name, &description)?;
      println!("Added category {} ({})", category.name, category.id);
    }
    CategoryCommand::Update {
      id,
      name,
      description,
    } => {
      app.require_user()?;
      let category = app.categories().update(Category {
        id,
        name,
        description,
      })?;
      println!("Updated category {}", category.id);
    }
    CategoryCommand::Delete { id } => {
      app.require_user()?;
      app.categories().delete(id)?;
      println!("Deleted category {}", id);
    }
  }
  Ok(())
}

fn password_or_env(password: Option<String>) -> Result<String> {
  match password {
    Some(p) => Ok(p),
    None => Config::get_password(),
  }
}

/// Tell the user when they are not looking at live data.
fn note_source(source: CacheSource) {
  let note = match source {
    CacheSource::Network => return,
    CacheSource::Cache => "offline: showing cached data",
    CacheSource::Seed => "offline: showing sample data",
    CacheSource::Fallback => "offline: showing demo ticket",
  };
  eprintln!("({})", note);
}

fn print_status(app: &mut App) -> Result<()> {
  println!("api:      {}", app.config().api.url);
  match app.session().user() {
    Some(user) if app.session().is_authenticated() => {
      println!("session:  {} ({})", user.full_name(), user.role)
    }
    _ => println!("session:  not logged in"),
  }
  println!("access:   {}", access_level(app));
  let syncing = app.session().is_loading() || app.tickets().is_loading();
  println!("sync:     {}", if syncing { "in progress" } else { "idle" });

  let users = app.users().fetch()?.len();
  let tickets = app.tickets().fetch()?.len();
  let categories = app.categories().categories().len();
  println!("cached:   {} users, {} tickets, {} categories", users, tickets, categories);

  let errors = [
    ("users", app.users().error().map(String::from)),
    ("tickets", app.tickets().error().map(String::from)),
    ("categories", app.categories().error().map(String::from)),
  ];
  for (store, error) in errors {
    if let Some(error) = error {
      println!("{} error: {}", store, error);
    }
  }
  Ok(())
}

fn access_level(app: &App) -> &'static str {
  let session = app.session();
  if !session.is_authenticated() {
    "none"
  } else if session.is_admin() {
    "administration"
  } else if session.is_assistant() {
    "all tickets"
  } else if session.is_employee() {
    "own tickets"
  } else {
    "none"
  }
}

fn print_user(user: &User) {
  println!("{} <{}>", user.full_name(), user.email);
  println!("id:   {}", user.id);
  println!("role: {}", user.role);
  if let Some(department) = &user.department {
    println!("department: {}", department);
  }
}

fn print_tickets(tickets: &[Ticket]) {
  if tickets.is_empty() {
    println!("No tickets");
    return;
  }
  for t in tickets {
    println!(
      "{:<24} {:<12} {:<8} {:<6} {}",
      t.id, t.status, t.priority, t.assigned_to, t.title
    );
  }
}

fn print_ticket(ticket: &Ticket) {
  println!("{}  {}", ticket.id, ticket.title);
  println!("status:   {}", ticket.status);
  println!("priority: {}", ticket.priority);
  println!("category: {}", ticket.category);
  println!("created:  {} by {}", ticket.created_at, ticket.created_by);
  println!("updated:  {}", ticket.updated_at);
  if !ticket.assigned_to.is_empty() {
    println!("assigned: {}", ticket.assigned_to);
  }
  if !ticket.description.is_empty() {
    println!();
    println!("{}", ticket.description);
  }
}

fn print_categories(categories: &[Category]) {
  for c in categories {
    println!("{:<4} {:<24} {}", c.id, c.name, c.description);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::test_support::{closed_port_url, respond_with};
  use crate::cache::{KeyValueStore, MemoryStorage, TOKEN_KEY, USER_ID_KEY};
  use crate::config::ApiConfig;
  use std::sync::Arc;

  /// App talking to `api_url` with `user_id` logged in.
  async fn app_at(api_url: &str, user_id: &str) -> App {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, "abc").unwrap();
    storage.set(USER_ID_KEY, user_id).unwrap();
    let config = Config {
      api: ApiConfig {
        url: format!("{}/api", api_url),
        timeout_secs: Some(5),
      },
      dev_mode: true,
      ..Config::default()
    };
    App::start(config, storage).await.unwrap()
  }

  /// Offline app with employee "3" logged in.
  async fn offline_app() -> App {
    app_at(&closed_port_url().await, "3").await
  }

  #[tokio::test]
  async fn test_create_ticket_offline_saves_locally() {
    let mut app = offline_app().await;
    let command = TicketCommand::Create {
      title: "Sin red".to_string(),
      description: String::new(),
      priority: "LOW".to_string(),
      category: String::new(),
    };
    execute(&mut app, Command::Tickets(command)).await.unwrap();

    let created = app.tickets().tickets().last().cloned().unwrap();
    assert_eq!(created.title, "Sin red");
    assert_eq!(created.created_by, "3");
    assert_eq!(app.tickets().tickets().len(), 4);
  }

  #[tokio::test]
  async fn test_status_offline_updates_cache() {
    let mut app = offline_app().await;
    let command = TicketCommand::Status {
      id: "TICKET-20250301090000".to_string(),
      status: "closed".to_string(),
    };
    execute(&mut app, Command::Tickets(command)).await.unwrap();
    assert_eq!(
      app.tickets().find("TICKET-20250301090000").unwrap().status,
      "closed"
    );
  }

  #[tokio::test]
  async fn test_update_without_changes_is_rejected() {
    let mut app = offline_app().await;
    let command = TicketCommand::Update {
      id: "TICKET-20250301090000".to_string(),
      title: None,
      description: None,
      priority: None,
      category: None,
    };
    let err = execute(&mut app, Command::Tickets(command)).await.unwrap_err();
    assert_eq!(err.to_string(), "Nothing to update");
  }

  #[tokio::test]
  async fn test_category_commands() {
    let mut app = offline_app().await;
    let add = CategoryCommand::Add {
      name: "Redes".to_string(),
      description: "VPN".to_string(),
    };
    execute(&mut app, Command::Categories(add)).await.unwrap();
    assert_eq!(app.categories().find(5).unwrap().name, "Redes");

    let delete = CategoryCommand::Delete { id: 5 };
    execute(&mut app, Command::Categories(delete)).await.unwrap();
    assert!(app.categories().find(5).is_none());
  }

  #[tokio::test]
  async fn test_live_list_offline_succeeds_with_placeholder() {
    let mut app = offline_app().await;
    let command = TicketCommand::List {
      mine: false,
      live: true,
    };
    execute(&mut app, Command::Tickets(command)).await.unwrap();
    assert!(app.tickets().tickets().is_empty());
  }

  #[tokio::test]
  async fn test_user_admin_commands_need_admin() {
    let mut app = offline_app().await;
    let delete = UserCommand::Delete { id: "1".to_string() };
    let err = execute(&mut app, Command::Users(delete)).await.unwrap_err();
    assert!(err.to_string().contains("administrators"));
    assert!(app.users().find("1").is_some());
  }

  #[tokio::test]
  async fn test_employee_cannot_assign() {
    let mut app = offline_app().await;
    let command = TicketCommand::Assign {
      id: "TICKET-20250310101500".to_string(),
      user_id: "2".to_string(),
    };
    assert!(execute(&mut app, Command::Tickets(command)).await.is_err());
    app.tickets().fetch().unwrap();
    assert!(app.tickets().find("TICKET-20250310101500").unwrap().assigned_to.is_empty());
  }

  #[tokio::test]
  async fn test_status_loads_caches() {
    let mut app = offline_app().await;
    execute(&mut app, Command::Status).await.unwrap();
    assert_eq!(access_level(&app), "own tickets");
    assert!(!app.tickets().is_loading());
    assert_eq!(app.tickets().tickets().len(), 3);
    assert_eq!(app.users().users().len(), 3);
  }

  #[tokio::test]
  async fn test_refused_delete_is_not_applied_locally() {
    let (url, _requests) = respond_with(403, "forbidden").await;
    let mut app = app_at(&url, "1").await;

    let command = TicketCommand::Delete {
      id: "TICKET-20250301090000".to_string(),
    };
    let err = execute(&mut app, Command::Tickets(command)).await.unwrap_err();
    assert_eq!(err.to_string(), "forbidden");
    assert!(app.tickets().find("TICKET-20250301090000").is_some());
  }

  #[tokio::test]
  async fn test_refused_status_change_is_not_applied_locally() {
    let (url, _requests) = respond_with(404, "Ticket not found").await;
    let mut app = app_at(&url, "1").await;

    let command = TicketCommand::Status {
      id: "TICKET-20250301090000".to_string(),
      status: "closed".to_string(),
    };
    assert!(execute(&mut app, Command::Tickets(command)).await.is_err());
    assert_eq!(
      app.tickets().find("TICKET-20250301090000").unwrap().status,
      "open"
    );
  }

  #[tokio::test]
  async fn test_tickets_require_login() {
    let mut app = offline_app().await;
    execute(&mut app, Command::Logout).await.unwrap();

    let result = execute(&mut app, Command::Tickets(TicketCommand::List {
      mine: false,
      live: false,
    })).await;
    assert!(result.is_err());
  }
}
