//! Startup fixture accounts

use crate::{
    config::SeedAccount,
    store::AccountStore,
    types::Account,
    Error, Result,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info};

/// Demo accounts provisioned when seeding is enabled
pub fn default_fixtures() -> Vec<SeedAccount> {
    [
        ("Alice Johnson", "alice@example.com", "1000.00"),
        ("Bob Smith", "bob@example.com", "750.50"),
        ("Charlie Brown", "charlie@example.com", "2500.75"),
        ("Diana Prince", "diana@example.com", "500.00"),
    ]
    .into_iter()
    .map(|(name, email, balance)| SeedAccount {
        name: name.to_string(),
        email: email.to_string(),
        balance: balance.to_string(),
    })
    .collect()
}

/// Provision `fixtures`, skipping any whose email is already taken
///
/// Safe to run on every start. Returns how many accounts were created.
pub fn seed_accounts(store: &dyn AccountStore, fixtures: &[SeedAccount]) -> Result<usize> {
    let mut created = 0;

    for fixture in fixtures {
        let balance = Decimal::from_str(&fixture.balance).map_err(|_| {
            Error::Config(format!(
                "Invalid seed balance for {}: {}",
                fixture.email, fixture.balance
            ))
        })?;
        if balance < Decimal::ZERO {
            return Err(Error::Config(format!(
                "Negative seed balance for {}",
                fixture.email
            )));
        }

        let account = Account::new(fixture.name.as_str(), fixture.email.as_str(), balance);

        match store.create_account(&account) {
            Ok(()) => {
                created += 1;
                info!(account_id = %account.id, email = %account.email, "Seeded account");
            }
            Err(Error::AlreadyExists(what)) => {
                debug!(existing = %what, "Seed account already present");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(created)
}
