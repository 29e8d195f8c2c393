use rand::distributions::Alphanumeric;
use rand::Rng;

/// Lifecycle status of a pooled account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Idle,
    Checking,
    Active,
    Error,
    Banned,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
    /// Pre-authenticated session token (auth_token / ct0). An account without
    /// one can still be dispatched — the backend falls back to password login.
    pub cookie: Option<String>,
    pub status: AccountStatus,
}

impl Account {
    /// Legal to select for the next dispatch iteration.
    pub fn is_eligible(&self) -> bool {
        !matches!(self.status, AccountStatus::Banned | AccountStatus::Error)
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect()
}

/// Parse pasted account text, one record per line, colon-delimited.
///
/// Accepted shapes: `user:pass`, `user:pass:email`, `user:pass:email:token`.
/// The token is everything from the fourth field onward rejoined with ':'
/// (auth tokens routinely contain colons). Lines without a usable username
/// and password are skipped without aborting the rest of the batch.
pub fn parse_accounts(input: &str) -> Vec<Account> {
    let mut accounts = Vec::new();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(':').collect();
        let (username, password, email, cookie) = match fields.as_slice() {
            [user, pass] => (*user, *pass, None, None),
            [user, pass, email] => (*user, *pass, Some(*email), None),
            [user, pass, email, token @ ..] => {
                (*user, *pass, Some(*email), Some(token.join(":")))
            }
            _ => continue,
        };

        if username.is_empty() || password.is_empty() {
            continue;
        }

        accounts.push(Account {
            id: generate_id(),
            username: username.to_string(),
            password: Some(password.to_string()),
            email: email.map(str::to_string),
            cookie,
            status: AccountStatus::Idle,
        });
    }

    accounts
}

/// In-memory account pool. Nothing here is persisted across runs.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn add_all(&mut self, accounts: Vec<Account>) {
        self.accounts.extend(accounts);
    }

    /// Remove a single account. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.id != id);
        self.accounts.len() != before
    }

    /// Drop the whole pool. Returns how many accounts were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.accounts.len();
        self.accounts.clear();
        n
    }

    pub fn set_status(&mut self, id: &str, status: AccountStatus) {
        if let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) {
            account.status = status;
        }
    }

    /// Re-derive statuses from credentials: token holders are marked Active,
    /// the rest fall back to Idle. Manual check, no backend round-trip.
    pub fn refresh_statuses(&mut self) {
        for account in &mut self.accounts {
            account.status = if account.cookie.is_some() {
                AccountStatus::Active
            } else {
                AccountStatus::Idle
            };
        }
    }

    /// Snapshot of accounts legal to dispatch right now.
    pub fn eligible(&self) -> Vec<Account> {
        self.accounts.iter().filter(|a| a.is_eligible()).cloned().collect()
    }
}
