//! Dashboard: repository lists and AI-suggested tasks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    pub id: u32,
    pub name: String,
    pub is_private: bool,
}

/// Reward currency. `Peso` is the Philippine peso (ISO `PHP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Peso,
    Eur,
    Jpy,
}

impl Currency {
    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Peso => "₱",
            Currency::Eur => "€",
            Currency::Jpy => "¥",
        }
    }
}

/// Format whole units with the currency symbol and comma thousands
/// separators: `15000` PESO is `₱15,000`.
pub fn format_currency(amount: u64, currency: Currency) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}", currency.symbol(), grouped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiTaskStatus {
    Open,
    InProgress,
    Review,
}

impl std::fmt::Display for AiTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiTaskStatus::Open => write!(f, "Open"),
            AiTaskStatus::InProgress => write!(f, "InProgress"),
            AiTaskStatus::Review => write!(f, "Review"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTask {
    pub id: u32,
    pub title: String,
    /// Name of the repository the task belongs to.
    pub repo: String,
    /// Whole currency units; zero means no reward.
    pub reward: u64,
    pub currency: Currency,
    pub status: AiTaskStatus,
}

impl AiTask {
    /// Text of the reward chip, or `None` when there is no reward.
    pub fn reward_label(&self) -> Option<String> {
        (self.reward > 0).then(|| format_currency(self.reward, self.currency))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoTab {
    #[default]
    Owned,
    PrivateAccess,
}

impl RepoTab {
    pub fn heading(self) -> &'static str {
        match self {
            RepoTab::Owned => "Your Owned Repositories",
            RepoTab::PrivateAccess => "Repositories with Private Access",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub owned: Vec<Repo>,
    pub private_access: Vec<Repo>,
    pub tasks: Vec<AiTask>,
    tab: RepoTab,
}

impl Dashboard {
    pub fn new(owned: Vec<Repo>, private_access: Vec<Repo>, tasks: Vec<AiTask>) -> Self {
        Self {
            owned,
            private_access,
            tasks,
            tab: RepoTab::Owned,
        }
    }

    /// Demo content shown before repositories are backed by storage.
    pub fn sample() -> Self {
        let repo = |id, name: &str, is_private| Repo {
            id,
            name: name.to_string(),
            is_private,
        };
        let task = |id, title: &str, repo: &str, status, reward, currency| AiTask {
            id,
            title: title.to_string(),
            repo: repo.to_string(),
            reward,
            currency,
            status,
        };
        Self::new(
            vec![
                repo(1, "Thesis Chapter 1", false),
                repo(2, "Agentic AI Capabilities", true),
                repo(3, "Platform Functionality", false),
            ],
            vec![
                repo(4, "Team Project Alpha", true),
                repo(5, "Funding Proposal 2025", true),
            ],
            vec![
                task(
                    101,
                    "Refine Data Collection Module",
                    "Thesis Chapter 1",
                    AiTaskStatus::Open,
                    50,
                    Currency::Usd,
                ),
                task(
                    102,
                    "Review Literature: MSME Context",
                    "Agentic AI Capabilities",
                    AiTaskStatus::Review,
                    0,
                    Currency::Usd,
                ),
                task(
                    103,
                    "Implement Signal R for Realtime Updates",
                    "Platform Functionality",
                    AiTaskStatus::InProgress,
                    15000,
                    Currency::Peso,
                ),
                task(
                    104,
                    "Draft Conclusion Summary (AI Suggestion)",
                    "Thesis Chapter 1",
                    AiTaskStatus::Open,
                    20,
                    Currency::Eur,
                ),
                task(
                    105,
                    "Fix CSS Bug in Desktop View",
                    "Team Project Alpha",
                    AiTaskStatus::Open,
                    5000,
                    Currency::Jpy,
                ),
            ],
        )
    }

    pub fn select_tab(&mut self, tab: RepoTab) {
        self.tab = tab;
    }

    pub fn tab(&self) -> RepoTab {
        self.tab
    }

    /// Repositories listed under the active tab.
    pub fn current_repos(&self) -> &[Repo] {
        match self.tab {
            RepoTab::Owned => &self.owned,
            RepoTab::PrivateAccess => &self.private_access,
        }
    }

    /// Case-insensitive substring search over every repository name.
    pub fn search_repos<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Repo> + 'a {
        let needle = query.trim().to_lowercase();
        self.owned
            .iter()
            .chain(&self.private_access)
            .filter(move |r| r.name.to_lowercase().contains(&needle))
    }
}
