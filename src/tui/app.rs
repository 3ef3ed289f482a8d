//! Catalogue browser.
//!
//! Left pane: the branch tree, built from the resolved parameter chains of all
//! visible tasks. Right pane: the tasks under the selected branch. A `/`
//! search filters tasks first and the tree is rebuilt from the matches, so
//! branches without a match disappear and counts reflect matches only.

use std::collections::BTreeSet;
use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::branch::{build_branch_tree, filter_tasks_with, BranchNode, BranchRow};
use crate::config::Settings;
use crate::cost::format_amount;
use crate::db::Database;
use crate::fields::Scope;
use crate::task::GeneratedTaskView;
use crate::tui::colors::{depth_color, DARK_GREEN, DARK_RED};
use crate::tui::utils::centered_rect;

/// Which pane has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tree,
    Tasks,
}

/// Browser state.
pub struct CatalogApp {
    db: Database,
    settings: Settings,
    scope: Scope,
    views: Vec<GeneratedTaskView>,
    tree: BranchNode,
    expanded: BTreeSet<Vec<String>>,
    rows: Vec<BranchRow>,
    tree_state: ListState,
    task_state: ListState,
    focus: Focus,
    filter_active: bool,
    filter_text: String,
    show_detail: bool,
    status_message: String,
}

impl CatalogApp {
    /// Build the browser over the tasks visible under `scope`.
    pub fn new(db: Database, settings: Settings, scope: Scope, org: Option<String>) -> Self {
        let views = db
            .visible_tasks(scope, org.as_deref())
            .into_iter()
            .map(|t| db.task_view(t, &settings))
            .collect();

        let mut app = CatalogApp {
            db,
            settings,
            scope,
            views,
            tree: BranchNode::default(),
            expanded: BTreeSet::new(),
            rows: Vec::new(),
            tree_state: ListState::default(),
            task_state: ListState::default(),
            focus: Focus::Tree,
            filter_active: false,
            filter_text: String::new(),
            show_detail: false,
            status_message: String::new(),
        };
        app.rebuild();
        app
    }

    /// Replace the search filter and rebuild the tree.
    pub fn set_filter(&mut self, text: &str) {
        self.filter_text = text.to_string();
        self.rebuild();
    }

    /// Rebuild the tree from the filtered views, keeping the selection in range.
    fn rebuild(&mut self) {
        let matching = filter_tasks_with(self.views.clone(), &self.filter_text, &self.settings.uncategorized_label);
        self.tree = build_branch_tree(matching, &self.settings.uncategorized_label);
        self.refresh_rows();
    }

    fn refresh_rows(&mut self) {
        self.rows = self.tree.rows(&self.expanded);
        let selected = match self.tree_state.selected() {
            _ if self.rows.is_empty() => None,
            Some(i) => Some(i.min(self.rows.len() - 1)),
            None => Some(0),
        };
        self.tree_state.select(selected);
        let has_tasks = !self.selected_tasks().is_empty();
        self.task_state.select(if has_tasks { Some(0) } else { None });
    }

    /// Visible tree rows.
    pub fn rows(&self) -> &[BranchRow] {
        &self.rows
    }

    /// Number of tasks matching the current filter.
    pub fn matching_count(&self) -> usize {
        self.tree.total()
    }

    /// Tasks under the selected branch, or every match when nothing is selected.
    pub fn selected_tasks(&self) -> Vec<&GeneratedTaskView> {
        match self.tree_state.selected().and_then(|i| self.rows.get(i)) {
            Some(row) => self.tree.find(&row.path).map(BranchNode::all_tasks).unwrap_or_default(),
            None => self.tree.all_tasks(),
        }
    }

    fn selected_task(&self) -> Option<&GeneratedTaskView> {
        let tasks = self.selected_tasks();
        self.task_state.selected().and_then(|i| tasks.get(i).copied())
    }

    /// Expand or collapse the selected branch.
    pub fn toggle_expand(&mut self) {
        let Some(row) = self.tree_state.selected().and_then(|i| self.rows.get(i)).cloned() else {
            return;
        };
        if !row.has_children {
            return;
        }
        if !self.expanded.remove(&row.path) {
            self.expanded.insert(row.path);
        }
        self.refresh_rows();
    }

    /// Collapse the selected branch, or move to its parent when already collapsed.
    fn collapse_or_parent(&mut self) {
        let Some(row) = self.tree_state.selected().and_then(|i| self.rows.get(i)).cloned() else {
            return;
        };
        if row.expanded {
            self.expanded.remove(&row.path);
            self.refresh_rows();
        } else if row.depth > 0 {
            let parent = &row.path[..row.path.len() - 1];
            if let Some(i) = self.rows.iter().position(|r| r.path == parent) {
                self.tree_state.select(Some(i));
                self.task_state.select(Some(0));
            }
        }
    }

    fn move_selection(&mut self, down: bool) {
        let (state, len) = match self.focus {
            Focus::Tree => (&mut self.tree_state, self.rows.len()),
            Focus::Tasks => {
                let len = self.selected_tasks().len();
                (&mut self.task_state, len)
            }
        };
        if len == 0 {
            return;
        }
        let current = state.selected().unwrap_or(0);
        let next = if down { (current + 1).min(len - 1) } else { current.saturating_sub(1) };
        state.select(Some(next));
        if self.focus == Focus::Tree {
            let has_tasks = !self.selected_tasks().is_empty();
            self.task_state.select(if has_tasks { Some(0) } else { None });
        }
    }

    /// Handle one key. Returns true when the app should exit.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if self.filter_active {
            match code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.set_filter("");
                    self.status_message.clear();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    self.status_message = if self.filter_text.is_empty() {
                        "Filter cleared".to_string()
                    } else {
                        format!("Filter: '{}' ({} tasks shown)", self.filter_text, self.matching_count())
                    };
                }
                KeyCode::Backspace => {
                    let mut text = self.filter_text.clone();
                    if text.pop().is_some() {
                        self.set_filter(&text);
                    }
                }
                KeyCode::Char(c) => {
                    let text = format!("{}{}", self.filter_text, c);
                    self.set_filter(&text);
                }
                _ => {}
            }
            return false;
        }

        if self.show_detail {
            if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                self.show_detail = false;
            }
            return false;
        }

        self.status_message.clear();
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('/') => self.filter_active = true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Tree => Focus::Tasks,
                    Focus::Tasks => Focus::Tree,
                };
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Right | KeyCode::Char('l') if self.focus == Focus::Tree => self.toggle_expand(),
            KeyCode::Left | KeyCode::Char('h') if self.focus == Focus::Tree => self.collapse_or_parent(),
            KeyCode::Enter => match self.focus {
                Focus::Tree => self.toggle_expand(),
                Focus::Tasks => {
                    if self.selected_task().is_some() {
                        self.show_detail = true;
                    } else {
                        self.status_message = "No task selected".to_string();
                    }
                }
            },
            _ => {}
        }
        false
    }

    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(self.handle_key(key.code, key.modifiers));
            }
        }
        Ok(false)
    }

    /// Main event loop.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Panes
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[1]);
        self.render_tree(f, panes[0]);
        self.render_tasks(f, panes[1]);
        self.render_status_bar(f, chunks[2]);

        if self.show_detail {
            self.render_detail_popup(f);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let scope = match self.scope {
            Scope::All => "all tasks",
            Scope::System => "system tasks",
            Scope::Organization => "organisation tasks",
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled("TASK CATALOGUE", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{} of {} {}", self.matching_count(), self.views.len(), scope),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn pane_block(&self, title: &str, pane: Focus) -> Block<'static> {
        let border = if self.focus == pane {
            Style::default().fg(DARK_GREEN).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Block::default().borders(Borders::ALL).title(title.to_string()).border_style(border)
    }

    fn render_tree(&mut self, f: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .rows
            .iter()
            .map(|row| {
                let marker = match (row.has_children, row.expanded) {
                    (false, _) => "  ",
                    (true, false) => "▸ ",
                    (true, true) => "▾ ",
                };
                ListItem::new(Line::from(vec![
                    Span::raw("  ".repeat(row.depth)),
                    Span::raw(marker),
                    Span::styled(row.label.clone(), Style::default().fg(depth_color(row.depth))),
                    Span::styled(format!(" ({})", row.count), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(self.pane_block("Branches", Focus::Tree))
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
        f.render_stateful_widget(list, area, &mut self.tree_state);
    }

    fn render_tasks(&mut self, f: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .selected_tasks()
            .iter()
            .map(|v| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<9}", v.code.as_deref().unwrap_or("-")),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(format!("{:<5} ", v.unit.as_deref().unwrap_or("-"))),
                    Span::raw(v.display_name.clone()),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(self.pane_block("Tasks", Focus::Tasks))
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
        f.render_stateful_widget(list, area, &mut self.task_state);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if self.filter_active {
            format!("Filter: {} | Type to search, Enter to apply, Esc to cancel", self.filter_text)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let filter = if self.filter_text.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.filter_text)
            };
            format!("Tasks: {}{} | /: Filter | Tab: Switch pane | →/←: Expand/Collapse | Enter: Details | q: Quit",
                self.matching_count(), filter)
        };
        let status = Paragraph::new(text)
            .style(Style::default().bg(DARK_GREEN).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Detail lines for a task: resolved chain and cost breakdown.
    pub fn detail_lines(&self, view: &GeneratedTaskView) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(Span::styled(view.display_name.clone(), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(""),
            Line::from(format!("Code:      {}", view.code.as_deref().unwrap_or("-"))),
            Line::from(format!("Category:  {}", view.category_name.as_deref().unwrap_or("-"))),
            Line::from(format!("Unit:      {}", view.unit.as_deref().unwrap_or("-"))),
            Line::from(""),
            Line::from("Parameters:"),
        ];
        if view.resolved.is_empty() {
            lines.push(Line::from("  -"));
        }
        for r in &view.resolved {
            lines.push(Line::from(format!("  {:<24} {}", r.label, r.option_label)));
        }
        lines.push(Line::from(""));

        match self.db.task_cost(view.id) {
            Ok(cost) => {
                let currency = cost.currency.as_deref().or(self.settings.default_currency.as_deref());
                lines.push(Line::from(format!("Materials: {}", format_amount(cost.breakdown.material_total, currency))));
                lines.push(Line::from(format!("Labor:     {}", format_amount(cost.breakdown.labor_total, currency))));
                lines.push(Line::from(Span::styled(
                    format!("Unit cost: {}", format_amount(cost.breakdown.grand_total, currency)),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                if cost.materials.iter().chain(cost.labor.iter()).any(|l| l.unit_price.is_none()) {
                    lines.push(Line::from(Span::styled(
                        "Some lines have no price yet",
                        Style::default().fg(DARK_RED),
                    )));
                }
            }
            Err(e) => lines.push(Line::from(Span::styled(format!("Cost unavailable: {e}"), Style::default().fg(DARK_RED)))),
        }
        lines
    }

    fn render_detail_popup(&self, f: &mut Frame) {
        let Some(view) = self.selected_task() else {
            return;
        };
        let area = centered_rect(80, 80, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Press Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(DARK_GREEN).add_modifier(Modifier::BOLD));
        let popup = Paragraph::new(self.detail_lines(view))
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }
}
