//! Repository page views and site navigation.

use serde::{Deserialize, Serialize};

/// Panel shown on the repository page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[serde(alias = "docs")]
    Documentation,
    Tasks,
    #[default]
    Canvas,
}

impl View {
    pub const ALL: [View; 3] = [View::Documentation, View::Tasks, View::Canvas];

    /// Navigation label.
    pub fn label(self) -> &'static str {
        match self {
            View::Documentation => "Docs & Files",
            View::Tasks => "Tasks",
            View::Canvas => "2D Canvas",
        }
    }
}

impl std::str::FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docs" | "documentation" => Ok(View::Documentation),
            "tasks" => Ok(View::Tasks),
            "canvas" => Ok(View::Canvas),
            _ => anyhow::bail!("Invalid view '{}'. Valid values: docs, tasks, canvas", s),
        }
    }
}

/// Which repository panel is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewSwitcher {
    active: View,
}

impl ViewSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, view: View) {
        self.active = view;
    }

    pub fn active(&self) -> View {
        self.active
    }

    pub fn is_active(&self, view: View) -> bool {
        self.active == view
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Documentation panel
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Document,
    Data,
}

impl FileKind {
    pub fn icon(self) -> &'static str {
        match self {
            FileKind::Text => "📝",
            FileKind::Document => "📄",
            FileKind::Data => "💾",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Display size, e.g. `"5.2 MB"`.
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOverview {
    pub name: String,
    pub description: String,
    pub author: String,
    pub files: Vec<RepoFile>,
}

impl RepoOverview {
    /// Placeholder repository shown until repositories are backed by storage.
    pub fn sample() -> Self {
        let file = |name: &str, kind, size: &str| RepoFile {
            name: name.to_string(),
            kind,
            size: size.to_string(),
        };
        Self {
            name: "Repo Name".to_string(),
            description: "A collaborative project for building visual IoT automation flows."
                .to_string(),
            author: "user-XYZ-42".to_string(),
            files: vec![
                file("README.md", FileKind::Text, "3 KB"),
                file("Task_List.md", FileKind::Text, "1 KB"),
                file("Thesis_Draft.pdf", FileKind::Document, "5.2 MB"),
                file("schema.json", FileKind::Data, "500 B"),
            ],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Routes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Signup,
    Dashboard,
    CreateRepo,
    Repo,
    AiDemo,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Home,
        Route::Login,
        Route::Signup,
        Route::Dashboard,
        Route::CreateRepo,
        Route::Repo,
        Route::AiDemo,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Dashboard => "/dashboard",
            Route::CreateRepo => "/create-repo",
            Route::Repo => "/repo",
            Route::AiDemo => "/aidemo",
        }
    }

    /// Resolve a request path, ignoring a trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        Route::ALL.into_iter().find(|r| r.path() == trimmed)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
