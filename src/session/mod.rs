//! Interactive Session
//!
//! The session is a small state machine:
//!
//! ```text
//! Unauthenticated --login--> Authenticated(identity) --logout--> Unauthenticated
//!        |
//!        +--exit / end of input--> Exited
//! ```
//!
//! Each authenticated choice opens a sub-menu that returns to the user menu.
//! Errors from an action are printed as one line and the enclosing menu is shown
//! again; only a closed or broken terminal ends the session early.
//!
//! Role-gated actions re-read the caller's role from the store at the moment
//! they are attempted, so a demotion by another session applies immediately.

pub mod console;
pub mod screens;

use crate::auth::{AuthService, Identity};
use crate::capability::{authorize, Capability, Role};
use crate::config::Settings;
use crate::engine::QueryExecutor;
use crate::error::{CafeError, Result};
use crate::menu::{MenuCatalog, MenuField, MenuItem, NewMenuItem};
use crate::money::Money;
use crate::orders::{OrderProcessor, PaymentChoice};
use crate::profile::{ProfileField, ProfileManager};

pub use console::{Console, ScriptedConsole, StdConsole};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Identity),
    Exited,
}

pub struct Session<'a, Q, C> {
    db: &'a Q,
    console: C,
    settings: Settings,
    state: SessionState,
}

impl<'a, Q: QueryExecutor, C: Console> Session<'a, Q, C> {
    #[must_use]
    pub const fn new(db: &'a Q, console: C, settings: Settings) -> Self {
        Self { db, console, settings, state: SessionState::Unauthenticated }
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn console(&self) -> &C {
        &self.console
    }

    #[must_use]
    pub fn into_console(self) -> C {
        self.console
    }

    /// Drive the menus until the user exits or input ends
    pub async fn run(&mut self) {
        while self.state != SessionState::Exited {
            if let Err(e) = self.step().await {
                // step() only lets session-ending errors through
                match e {
                    CafeError::InputClosed => tracing::debug!("input closed, ending session"),
                    other => tracing::warn!(error = %other, "terminal failure, ending session"),
                }
                self.state = SessionState::Exited;
            }
        }
    }

    /// Show the menu for the current state and handle one choice
    pub async fn step(&mut self) -> Result<()> {
        match self.state.clone() {
            SessionState::Unauthenticated => self.main_menu().await,
            SessionState::Authenticated(identity) => self.user_menu(identity).await,
            SessionState::Exited => Ok(()),
        }
    }

    async fn main_menu(&mut self) -> Result<()> {
        self.console.say(&screens::main_menu())?;
        match self.read_choice()? {
            1 => {
                let result = self.create_user().await;
                self.contain(result)
            }
            2 => {
                let result = self.log_in().await;
                self.contain(result)
            }
            9 => {
                self.state = SessionState::Exited;
                Ok(())
            }
            _ => self.console.say(screens::UNRECOGNIZED_CHOICE),
        }
    }

    async fn user_menu(&mut self, identity: Identity) -> Result<()> {
        self.console.say(&screens::user_menu())?;
        let result = match self.read_choice()? {
            1 => self.browse_menu(&identity.login).await,
            2 => self.update_profile(identity).await,
            3 => self.place_order(&identity.login).await,
            4 => self.console.say("Updating orders is not available."),
            5 => self.order_history(&identity.login).await,
            9 => {
                tracing::debug!(login = %identity.login, "logged out");
                self.state = SessionState::Unauthenticated;
                Ok(())
            }
            _ => self.console.say(screens::UNRECOGNIZED_CHOICE),
        };
        self.contain(result)
    }

    async fn create_user(&mut self) -> Result<()> {
        let login = self.console.prompt("\tEnter user login: ")?;
        let password = self.console.prompt_secret("\tEnter user password: ")?;
        let phone = self.console.prompt("\tEnter user phone: ")?;

        AuthService::new(self.db).register(&login, &password, &phone).await?;
        self.console.say("User successfully created!")
    }

    async fn log_in(&mut self) -> Result<()> {
        let login = self.console.prompt("\tEnter user login: ")?;
        let password = self.console.prompt_secret("\tEnter user password: ")?;

        let identity = AuthService::new(self.db).authenticate(&login, &password).await?;
        self.console.say(&format!("Welcome, {}! You are logged in as a {}.", identity.login, identity.role))?;
        self.state = SessionState::Authenticated(identity);
        Ok(())
    }

    async fn browse_menu(&mut self, login: &str) -> Result<()> {
        loop {
            let is_manager = self.require(login, Capability::BrowseMenu).await? == Role::Manager;
            self.console.say(&screens::cafe_menu(is_manager))?;

            let result = match self.read_choice()? {
                1 => self.list_items().await,
                2 => self.search_items(MenuSearch::Name).await,
                3 => self.search_items(MenuSearch::Type).await,
                4 => self.add_item(login).await,
                5 => self.update_item(login).await,
                6 => self.delete_item(login).await,
                9 => return Ok(()),
                _ => self.console.say(screens::UNRECOGNIZED_CHOICE),
            };
            self.contain(result)?;
        }
    }

    async fn list_items(&mut self) -> Result<()> {
        let items = self.catalog().list().await?;
        self.show_items(&items)
    }

    async fn search_items(&mut self, by: MenuSearch) -> Result<()> {
        let items = match by {
            MenuSearch::Name => {
                let name = self.console.prompt("\tEnter the item name: ")?;
                self.catalog().search_by_name(&name).await?
            }
            MenuSearch::Type => {
                let item_type = self.console.prompt("\tEnter the item type: ")?;
                self.catalog().search_by_type(&item_type).await?
            }
        };
        self.show_items(&items)
    }

    async fn add_item(&mut self, login: &str) -> Result<()> {
        self.require(login, Capability::ManageMenu).await?;

        let name = self.console.prompt("\tEnter the item name: ")?;
        let description = self.console.prompt("\tEnter the item description: ")?;
        let price = Money::parse(&self.console.prompt("\tEnter the item price: ")?)?;
        let item_type = self.console.prompt("\tEnter the item type: ")?;
        let image_url = self.console.prompt("\tEnter the item image URL: ")?;

        // Role may have changed while the form was being filled in
        self.require(login, Capability::ManageMenu).await?;
        let item = self
            .catalog()
            .add_item(&NewMenuItem { name, description, price, item_type, image_url })
            .await?;
        self.console.say(&format!("Item '{}' added.", item.name))
    }

    async fn update_item(&mut self, login: &str) -> Result<()> {
        self.require(login, Capability::ManageMenu).await?;

        let name = self.console.prompt("\tEnter the name of the item to update: ")?;
        self.console.say(&screens::item_fields())?;
        let field = loop {
            match self.read_choice()? {
                n @ 1..=5 => break MenuField::ALL[(n - 1) as usize],
                _ => self.console.say(screens::UNRECOGNIZED_CHOICE)?,
            }
        };
        let value = self.console.prompt(&format!("\tEnter the new {}: ", field.label()))?;

        self.require(login, Capability::ManageMenu).await?;
        self.catalog().update_field(&name, field, &value).await?;
        self.console.say(&format!("Item '{name}' updated."))
    }

    async fn delete_item(&mut self, login: &str) -> Result<()> {
        self.require(login, Capability::ManageMenu).await?;

        let name = self.console.prompt("\tEnter the name of the item to delete: ")?;

        self.require(login, Capability::ManageMenu).await?;
        let deleted = self.catalog().delete_item(&name).await?;
        self.console.say(&format!("Deleted {deleted} item(s) named '{name}'."))
    }

    async fn place_order(&mut self, login: &str) -> Result<()> {
        self.require(login, Capability::PlaceOrder).await?;

        let item = self.console.prompt("\tEnter the item name: ")?;
        self.console.say(&screens::payment_menu())?;
        let payment = loop {
            match self.read_choice()? {
                1 => break PaymentChoice::Now,
                2 => break PaymentChoice::Later,
                _ => self.console.say(screens::UNRECOGNIZED_CHOICE)?,
            }
        };

        let order = OrderProcessor::new(self.db, self.settings.order_id_retries)
            .place_order(login, &item, payment)
            .await?;
        self.console.say(&format!(
            "Order #{} placed for {item}: total ${}, {}.",
            order.order_id,
            order.total,
            if order.paid { "paid" } else { "to be paid later" }
        ))
    }

    async fn order_history(&mut self, login: &str) -> Result<()> {
        let orders = OrderProcessor::new(self.db, self.settings.order_id_retries)
            .history(login, self.settings.history_limit)
            .await?;

        if orders.is_empty() {
            return self.console.say("You have no orders yet.");
        }
        self.console.say("Your most recent orders:")?;
        for order in &orders {
            self.console.say(&format!("  {order}"))?;
        }
        Ok(())
    }

    async fn update_profile(&mut self, identity: Identity) -> Result<()> {
        self.require(&identity.login, Capability::UpdateOwnProfile).await?;

        let mut login = identity.login;
        let mut password = self.console.prompt_secret("\tEnter your password again: ")?;
        let current = AuthService::new(self.db).authenticate(&login, &password).await?;
        self.state = SessionState::Authenticated(current);

        loop {
            self.console.say(&screens::profile_menu())?;
            let choice = self.read_choice()?;
            let field = match choice {
                1 => ProfileField::Login,
                2 => ProfileField::Phone,
                3 => ProfileField::Password,
                4 => ProfileField::FavoriteItems,
                5 => {
                    let result = self.change_user_type(&login, &password).await;
                    self.contain(result)?;
                    continue;
                }
                9 => return Ok(()),
                _ => {
                    self.console.say(screens::UNRECOGNIZED_CHOICE)?;
                    continue;
                }
            };

            let label = format!("\tEnter your new {}: ", field.label());
            let value = if field == ProfileField::Password {
                self.console.prompt_secret(&label)?
            } else {
                self.console.prompt(&label)?
            };

            let result = ProfileManager::new(self.db)
                .update_own_field(&login, &password, field, &value)
                .await;
            if result.is_ok() {
                match field {
                    ProfileField::Login => {
                        login = value.trim().to_string();
                        let role = self.live_role(&login).await?;
                        self.state = SessionState::Authenticated(Identity { login: login.clone(), role });
                    }
                    ProfileField::Password => password = value,
                    ProfileField::Phone | ProfileField::FavoriteItems => {}
                }
                self.console.say(&format!("Your {} has been updated.", field.label()))?;
            }
            self.contain(result)?;
        }
    }

    async fn change_user_type(&mut self, login: &str, password: &str) -> Result<()> {
        self.require(login, Capability::ChangeUserType).await?;

        let target = self.console.prompt("\tEnter the login of the user to update: ")?;
        self.console.say(&screens::role_menu())?;
        let role = loop {
            match self.read_choice()? {
                1 => break Role::Manager,
                2 => break Role::Employee,
                3 => break Role::Customer,
                _ => self.console.say(screens::UNRECOGNIZED_CHOICE)?,
            }
        };

        ProfileManager::new(self.db).change_user_type(login, password, &target, role).await?;
        if target == login {
            self.state = SessionState::Authenticated(Identity { login: login.to_string(), role });
        }
        self.console.say("The user type has been updated.")
    }

    /// Read an integer choice, re-prompting until one is given
    fn read_choice(&mut self) -> Result<i64> {
        loop {
            let line = self.console.prompt(screens::CHOICE_PROMPT)?;
            match line.trim().parse() {
                Ok(choice) => return Ok(choice),
                Err(_) => self.console.say(screens::INVALID_INPUT)?,
            }
        }
    }

    /// Report a contained error; pass session-ending errors through
    fn contain(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if e.ends_session() => Err(e),
            Err(e) => {
                tracing::debug!(code = e.error_code(), "action failed");
                self.console.complain(&format!("Error: {e}"))
            }
            Ok(()) => Ok(()),
        }
    }

    async fn live_role(&self, login: &str) -> Result<Role> {
        AuthService::new(self.db).current_role(login).await
    }

    /// Authorize a capability against the caller's role as stored right now
    /// Re-read the caller's role, record it and check it grants `capability`
    async fn require(&mut self, login: &str, capability: Capability) -> Result<Role> {
        let role = self.live_role(login).await?;
        if let SessionState::Authenticated(identity) = &mut self.state {
            identity.role = role;
        }
        authorize(role, capability)?;
        Ok(role)
    }

    fn catalog(&self) -> MenuCatalog<'a, Q> {
        MenuCatalog::new(self.db, self.settings.case_insensitive_search)
    }

    fn show_items(&mut self, items: &[MenuItem]) -> Result<()> {
        if items.is_empty() {
            return self.console.say("No items found.");
        }
        for item in items {
            self.console.say(&format!("  {item}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum MenuSearch {
    Name,
    Type,
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::engine::sqlite::SqliteExecutor;
    use crate::schema::install_schema;

    async fn store() -> SqliteExecutor {
        let db = SqliteExecutor::open_in_memory().unwrap();
        install_schema(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_exit_from_main_menu() {
        let db = store().await;
        let mut session = Session::new(&db, ScriptedConsole::new(["9"]), Settings::default());
        session.run().await;
        assert_eq!(session.state(), &SessionState::Exited);
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts_without_state_change() {
        let db = store().await;
        let mut session = Session::new(&db, ScriptedConsole::new(["abc", "42"]), Settings::default());

        session.step().await.unwrap();
        assert_eq!(session.state(), &SessionState::Unauthenticated);

        let transcript = session.console().transcript();
        assert!(transcript.contains(screens::INVALID_INPUT));
        assert!(transcript.contains(screens::UNRECOGNIZED_CHOICE));
    }

    #[tokio::test]
    async fn test_end_of_input_ends_session() {
        let db = store().await;
        let mut session = Session::new(&db, ScriptedConsole::new(["2", "alice"]), Settings::default());
        session.run().await;
        assert_eq!(session.state(), &SessionState::Exited);
    }

    #[tokio::test]
    async fn test_login_failure_stays_unauthenticated() {
        let db = store().await;
        let mut session =
            Session::new(&db, ScriptedConsole::new(["2", "ghost", "pw"]), Settings::default());

        session.step().await.unwrap();
        assert_eq!(session.state(), &SessionState::Unauthenticated);
        assert_eq!(session.console().errors(), "Error: Invalid login or password\n");
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let db = store().await;
        let console = ScriptedConsole::new(["1", "alice", "pw1", "555-0100", "2", "alice", "pw1", "9"]);
        let mut session = Session::new(&db, console, Settings::default());

        session.step().await.unwrap();
        assert_eq!(session.state(), &SessionState::Unauthenticated);

        session.step().await.unwrap();
        assert_eq!(
            session.state(),
            &SessionState::Authenticated(Identity { login: "alice".to_string(), role: Role::Customer })
        );

        session.step().await.unwrap();
        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }
}
