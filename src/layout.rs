use iced::{Point, Size};

use crate::config::WindowConfig;

/// Room the attachment preview takes above the input, spacing included.
const ATTACHMENT_ROW_HEIGHT: u32 = 48;

/// Overlay geometry: the current height and where the window first appeared.
#[derive(Debug, Clone)]
pub struct WindowLayout {
    config: WindowConfig,
    height: u32,
    home: Option<Point>,
}

impl WindowLayout {
    pub fn new(config: WindowConfig) -> Self {
        WindowLayout {
            height: config.collapsed_height,
            config,
            home: None,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.config.width as f32, self.height as f32)
    }

    fn target_height(&self, has_transcript: bool, has_attachment: bool) -> u32 {
        if has_transcript {
            self.config.expanded_height
        } else if has_attachment {
            self.config.collapsed_height + ATTACHMENT_ROW_HEIGHT
        } else {
            self.config.collapsed_height
        }
    }

    /// Returns the new size when the content calls for a different height.
    pub fn fit(&mut self, has_transcript: bool, has_attachment: bool) -> Option<Size> {
        let target = self.target_height(has_transcript, has_attachment);
        if target == self.height {
            return None;
        }
        self.height = target;
        Some(self.size())
    }

    pub fn collapse(&mut self) -> Size {
        self.height = self.config.collapsed_height;
        self.size()
    }

    /// Keeps the first position seen; later drags do not move home.
    pub fn remember_home(&mut self, position: Point) {
        if self.home.is_none() {
            tracing::debug!("Window home at {:?}", position);
            self.home = Some(position);
        }
    }

    pub fn home(&self) -> Option<Point> {
        self.home
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> WindowLayout {
        WindowLayout::new(WindowConfig::default())
    }

    #[test]
    fn test_starts_collapsed() {
        assert_eq!(layout().size(), Size::new(700.0, 80.0));
    }

    #[test]
    fn test_attachment_grows_and_shrinks_collapsed_window() {
        let mut layout = layout();

        assert_eq!(layout.fit(false, true), Some(Size::new(700.0, 128.0)));
        assert_eq!(layout.fit(false, true), None);
        assert_eq!(layout.fit(false, false), Some(Size::new(700.0, 80.0)));
    }

    #[test]
    fn test_transcript_wins_over_attachment() {
        let mut layout = layout();
        layout.fit(false, true);

        assert_eq!(layout.fit(true, true), Some(Size::new(700.0, 600.0)));
        assert_eq!(layout.fit(true, false), None);
        assert_eq!(layout.collapse(), Size::new(700.0, 80.0));
        assert_eq!(layout.fit(false, false), None);
    }

    #[test]
    fn test_home_is_first_position() {
        let mut layout = layout();
        assert!(layout.home().is_none());

        layout.remember_home(Point::new(610.0, 500.0));
        layout.remember_home(Point::new(10.0, 20.0));
        assert_eq!(layout.home(), Some(Point::new(610.0, 500.0)));
    }
}
