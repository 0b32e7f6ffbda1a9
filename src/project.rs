use std::path::PathBuf;
use uuid::Uuid;

use crate::components::history::HistoryManager;
use crate::surface::{ImageRef, SurfaceState};

/// Single open composition.
pub struct Project {
    pub id: Uuid,
    pub surface: SurfaceState,
    pub history: HistoryManager,
    /// `None` for unsaved/untitled compositions.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Project {
    pub fn new_untitled(
        untitled_counter: usize,
        width: u32,
        height: u32,
        max_undo_steps: usize,
    ) -> Self {
        let mut surface = SurfaceState::new(width, height);
        surface.base.image = Some(ImageRef::Builtin("character.sunny".to_string()));

        let mut history = HistoryManager::new(max_undo_steps);
        // Capture the initial state so the very first edit is undoable.
        history.record(&surface, "Initial State");

        Self {
            id: Uuid::new_v4(),
            surface,
            history,
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    pub fn from_file(path: PathBuf, surface: SurfaceState, max_undo_steps: usize) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let mut history = HistoryManager::new(max_undo_steps);
        history.record(&surface, "Initial State");

        Self {
            id: Uuid::new_v4(),
            surface,
            history,
            path: Some(path),
            is_dirty: false,
            name,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_records_the_initial_state() {
        let p = Project::new_untitled(1, 480, 480, 50);
        assert_eq!(p.history.undo_count(), 1);
        assert!(p.surface.base.image.is_some());
        assert_eq!(p.name, "Untitled-1");
    }

    #[test]
    fn display_title_flags_dirty_projects() {
        let mut p = Project::new_untitled(2, 480, 480, 50);
        assert_eq!(p.display_title(), "Untitled-2");
        p.mark_dirty();
        assert_eq!(p.display_title(), "Untitled-2*");
    }
}
