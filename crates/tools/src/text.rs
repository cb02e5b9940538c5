use std::collections::{HashMap, HashSet};

use scenelink_core::InspectorUi;

/// [`InspectorUi`] that renders to indented text lines.
///
/// Interactions come from a script. A scripted action is addressed either by
/// its full id path (`"Health/Remove"`) or by its bare label (`"Add Entity"`)
/// and fires once.
#[derive(Debug, Default)]
pub struct TextInspector {
    lines: Vec<String>,
    depth: usize,
    ids: Vec<String>,
    clipboard: Option<String>,

    clicks: HashSet<String>,
    toggles: HashSet<String>,
    floats: HashMap<String, f32>,
    ints: HashMap<String, i64>,
    texts: HashMap<String, String>,
}

impl TextInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press a button, open a menu or pick a menu item.
    pub fn click(&mut self, target: impl Into<String>) -> &mut Self {
        self.clicks.insert(target.into());
        self
    }

    pub fn toggle(&mut self, target: impl Into<String>) -> &mut Self {
        self.toggles.insert(target.into());
        self
    }

    pub fn set_f32(&mut self, target: impl Into<String>, value: f32) -> &mut Self {
        self.floats.insert(target.into(), value);
        self
    }

    pub fn set_int(&mut self, target: impl Into<String>, value: i64) -> &mut Self {
        self.ints.insert(target.into(), value);
        self
    }

    pub fn set_text(&mut self, target: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.texts.insert(target.into(), value.into());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Everything rendered so far, one widget per line.
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn clipboard(&self) -> Option<&str> {
        self.clipboard.as_deref()
    }

    /// Forget rendered lines. The script is kept.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.depth = 0;
        self.ids.clear();
    }

    fn emit(&mut self, line: String) {
        self.lines.push(format!("{}{line}", "  ".repeat(self.depth)));
    }

    fn path(&self, label: &str) -> String {
        let mut path = self.ids.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(label);
        path
    }

    fn take_click(&mut self, label: &str) -> bool {
        let path = self.path(label);
        take_flag(&mut self.clicks, &path, label)
    }
}

fn take_flag(script: &mut HashSet<String>, path: &str, label: &str) -> bool {
    script.remove(path) || script.remove(label)
}

fn take_value<T>(script: &mut HashMap<String, T>, path: &str, label: &str) -> Option<T> {
    script.remove(path).or_else(|| script.remove(label))
}

impl InspectorUi for TextInspector {
    fn heading(&mut self, text: &str) {
        self.emit(format!("== {text} =="));
    }

    fn label(&mut self, text: &str) {
        self.emit(text.to_owned());
    }

    fn push_id(&mut self, id: &str) {
        self.ids.push(id.to_owned());
    }

    fn pop_id(&mut self) {
        self.ids.pop();
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn unindent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool {
        let path = self.path(label);
        let toggled = take_flag(&mut self.toggles, &path, label);
        if toggled {
            *value = !*value;
        }
        self.emit(format!("[{}] {label}", if *value { "x" } else { " " }));
        toggled
    }

    fn button(&mut self, label: &str) -> bool {
        self.emit(format!("<{label}>"));
        self.take_click(label)
    }

    fn begin_menu(&mut self, label: &str, enabled: bool) -> bool {
        if !enabled {
            self.emit(format!("{label} > (disabled)"));
            return false;
        }
        self.emit(format!("{label} >"));
        let open = self.take_click(label);
        if open {
            self.depth += 1;
        }
        open
    }

    fn menu_item(&mut self, label: &str, enabled: bool) -> bool {
        if !enabled {
            self.emit(format!("- {label} (disabled)"));
            return false;
        }
        self.emit(format!("- {label}"));
        self.take_click(label)
    }

    fn end_menu(&mut self) {
        self.unindent();
    }

    fn collapsing_header(&mut self, label: &str, leaf: bool) -> bool {
        if leaf {
            self.emit(format!("* {label}"));
            return false;
        }
        self.emit(format!("v {label}"));
        true
    }

    fn edit_f32(&mut self, label: &str, value: &mut f32) -> bool {
        let path = self.path(label);
        let edited = take_value(&mut self.floats, &path, label);
        let changed = match edited {
            Some(new) if new != *value => {
                *value = new;
                true
            }
            _ => false,
        };
        self.emit(format!("{label}: {value:.3}"));
        changed
    }

    fn edit_i32(&mut self, label: &str, value: &mut i32) -> bool {
        let path = self.path(label);
        let edited =
            take_value(&mut self.ints, &path, label).and_then(|new| i32::try_from(new).ok());
        let changed = match edited {
            Some(new) if new != *value => {
                *value = new;
                true
            }
            _ => false,
        };
        self.emit(format!("{label}: {value}"));
        changed
    }

    fn edit_u32(&mut self, label: &str, value: &mut u32) -> bool {
        let path = self.path(label);
        let edited =
            take_value(&mut self.ints, &path, label).and_then(|new| u32::try_from(new).ok());
        let changed = match edited {
            Some(new) if new != *value => {
                *value = new;
                true
            }
            _ => false,
        };
        self.emit(format!("{label}: {value}"));
        changed
    }

    fn edit_text(&mut self, label: &str, value: &mut String) -> bool {
        let path = self.path(label);
        let edited = take_value(&mut self.texts, &path, label);
        let changed = match edited {
            Some(new) if new != *value => {
                *value = new;
                true
            }
            _ => false,
        };
        self.emit(format!("{label}: {value:?}"));
        changed
    }

    fn set_clipboard_text(&mut self, text: &str) {
        tracing::debug!(text, "clipboard set");
        self.clipboard = Some(text.to_owned());
    }
}
