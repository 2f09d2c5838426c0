//! Per-request menu trees.
//!
//! Every request starts with the same five empty menus. Modules add items
//! while routing; the theme renders them. Siblings are kept ordered by their
//! `sort` weight, then label, then insertion order.

use crate::escape_html;
use serde::Serialize;
use std::fmt;

/// The named menus available on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuName {
    /// Administration navigation
    Admin,
    /// Toolbar shown to administrators
    AdminToolbar,
    /// Toolbar shown to signed-in users
    UserToolbar,
    /// Main site navigation
    Primary,
    /// Secondary site navigation
    Secondary,
}

impl MenuName {
    /// All menus, in rendering order.
    pub const ALL: [Self; 5] = [
        Self::Admin,
        Self::AdminToolbar,
        Self::UserToolbar,
        Self::Primary,
        Self::Secondary,
    ];

    /// Canonical name used by layouts (`{{menu:primary}}`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::AdminToolbar => "admin_toolbar",
            Self::UserToolbar => "user_toolbar",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// Parse a canonical name. `adminToolbar`-style names are accepted too.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "admin" => Some(Self::Admin),
            "admin_toolbar" | "adminToolbar" => Some(Self::AdminToolbar),
            "user_toolbar" | "userToolbar" => Some(Self::UserToolbar),
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Admin => 0,
            Self::AdminToolbar => 1,
            Self::UserToolbar => 2,
            Self::Primary => 3,
            Self::Secondary => 4,
        }
    }
}

impl fmt::Display for MenuName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a menu tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    /// Path segment identifying this node among its siblings
    pub key: String,
    /// Display label
    pub label: String,
    /// Link target; intermediate nodes created implicitly have none
    pub url: Option<String>,
    /// Sort weight, ascending
    pub sort: i32,
    /// Child nodes, kept ordered
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    fn placeholder(key: &str) -> Self {
        Self {
            key: key.to_string(),
            label: key.to_string(),
            url: None,
            sort: 0,
            children: Vec::new(),
        }
    }

    fn order_key(&self) -> (i32, &str) {
        (self.sort, &self.label)
    }
}

fn insert_sorted(items: &mut Vec<MenuItem>, item: MenuItem) -> usize {
    let at = items.partition_point(|existing| existing.order_key() <= item.order_key());
    items.insert(at, item);
    at
}

/// An ordered menu tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuTree {
    name: MenuName,
    items: Vec<MenuItem>,
}

impl MenuTree {
    /// An empty menu.
    #[must_use]
    pub const fn new(name: MenuName) -> Self {
        Self {
            name,
            items: Vec::new(),
        }
    }

    /// Which menu this is.
    #[must_use]
    pub const fn name(&self) -> MenuName {
        self.name
    }

    /// Top-level items in order.
    #[must_use]
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Whether the menu has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add or update the item at a `/`-separated path.
    ///
    /// Missing intermediate nodes are created with their key as label. If the
    /// node already exists its label, URL and sort weight are replaced and it
    /// is re-positioned among its siblings; its children are kept.
    pub fn add(&mut self, path: &str, label: impl Into<String>, url: Option<String>, sort: i32) {
        let keys: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((leaf, parents)) = keys.split_last() else {
            return;
        };

        let mut level = &mut self.items;
        for key in parents {
            let at = match level.iter().position(|item| item.key == *key) {
                Some(at) => at,
                None => insert_sorted(level, MenuItem::placeholder(key)),
            };
            level = &mut level[at].children;
        }

        let children = level
            .iter()
            .position(|item| item.key == *leaf)
            .map(|at| level.remove(at).children)
            .unwrap_or_default();

        insert_sorted(
            level,
            MenuItem {
                key: (*leaf).to_string(),
                label: label.into(),
                url,
                sort,
                children,
            },
        );
    }

    /// Render as nested `<ul>` lists. An empty menu renders as nothing.
    #[must_use]
    pub fn render_html(&self) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        render_level(&mut out, &self.items, Some(self.name));
        out
    }
}

fn render_level(out: &mut String, items: &[MenuItem], root: Option<MenuName>) {
    match root {
        Some(name) => out.push_str(&format!(r#"<ul class="menu menu-{name}">"#)),
        None => out.push_str("<ul>"),
    }
    for item in items {
        out.push_str("<li>");
        let label = escape_html(&item.label);
        match &item.url {
            Some(url) => out.push_str(&format!(r#"<a href="{}">{label}</a>"#, escape_html(url))),
            None => out.push_str(&format!("<span>{label}</span>")),
        }
        if !item.children.is_empty() {
            render_level(out, &item.children, None);
        }
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

/// The five named menus of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSet {
    menus: [MenuTree; 5],
}

impl MenuSet {
    /// Five empty menus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            menus: [
                MenuTree::new(MenuName::Admin),
                MenuTree::new(MenuName::AdminToolbar),
                MenuTree::new(MenuName::UserToolbar),
                MenuTree::new(MenuName::Primary),
                MenuTree::new(MenuName::Secondary),
            ],
        }
    }

    /// Borrow a menu.
    #[must_use]
    pub const fn get(&self, name: MenuName) -> &MenuTree {
        &self.menus[name.index()]
    }

    /// Borrow a menu mutably.
    pub fn get_mut(&mut self, name: MenuName) -> &mut MenuTree {
        &mut self.menus[name.index()]
    }

    /// Iterate menus in rendering order.
    pub fn iter(&self) -> impl Iterator<Item = &MenuTree> {
        self.menus.iter()
    }
}

impl Default for MenuSet {
    fn default() -> Self {
        Self::new()
    }
}
