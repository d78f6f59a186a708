pub mod config;
pub mod focus;
pub mod habit;

use std::error::Error;
use std::sync::Arc;

use serde::Serialize;
use synitheia_core::focus::Notifier;
use synitheia_core::service::HabitService;
use synitheia_core::{Config, Database, UserContext};

use crate::terminal::TerminalNotifier;

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Everything a command needs: loaded config, open database, acting user.
pub struct Context {
    pub config: Config,
    pub db: Arc<Database>,
    pub user: UserContext,
}

impl Context {
    pub fn load(user: Option<String>) -> CliResult<Self> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        let user = UserContext::new(user.unwrap_or_else(|| config.user.id.clone()));
        Ok(Self { config, db, user })
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::new(TerminalNotifier::new(self.config.notifications.enabled))
    }

    pub fn habits(&self) -> HabitService {
        HabitService::new(Arc::clone(&self.db), self.user.clone(), self.notifier())
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn points(user: Option<String>) -> CliResult {
    let ctx = Context::load(user)?;
    let balance = ctx.habits().balance()?;
    print_json(&serde_json::json!({
        "userId": ctx.user.user_id(),
        "totalRewardPoints": balance,
    }))
}
