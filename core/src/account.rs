//! Sending identities

use crate::config::{default_sendmail_command, AccountConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub realname: String,
    pub aliases: Vec<String>,
    pub sendmail_command: String,
}

impl Account {
    pub fn new(address: impl Into<String>, realname: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            realname: realname.into(),
            aliases: Vec::new(),
            sendmail_command: default_sendmail_command(),
        }
    }

    /// Primary address first, then aliases
    pub fn addresses(&self) -> Vec<&str> {
        std::iter::once(self.address.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .collect()
    }

    pub fn matches(&self, address: &str) -> bool {
        self.addresses()
            .iter()
            .any(|a| a.eq_ignore_ascii_case(address.trim()))
    }

    pub fn from_header(&self) -> String {
        if self.realname.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.realname, self.address)
        }
    }
}

impl From<&AccountConfig> for Account {
    fn from(config: &AccountConfig) -> Self {
        Self {
            address: config.address.clone(),
            realname: config.realname.clone(),
            aliases: config.aliases.clone(),
            sendmail_command: config.sendmail_command.clone(),
        }
    }
}

/// Address → identity lookup used by compose and send
pub trait AccountResolver {
    fn resolve(&self, address: &str) -> Option<Account>;
    fn list_accounts(&self) -> Vec<Account>;
}

#[derive(Debug, Clone, Default)]
pub struct AccountManager {
    accounts: Vec<Account>,
}

impl AccountManager {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn from_config(configs: &[AccountConfig]) -> Self {
        Self::new(configs.iter().map(Account::from).collect())
    }
}

impl AccountResolver for AccountManager {
    fn resolve(&self, address: &str) -> Option<Account> {
        self.accounts.iter().find(|a| a.matches(address)).cloned()
    }

    fn list_accounts(&self) -> Vec<Account> {
        self.accounts.clone()
    }
}
