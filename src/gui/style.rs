use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

/// A device row in the scan results. The selected row is highlighted.
pub struct DeviceRowStyleSheet {
    pub selected: bool,
}

impl StyleSheet for DeviceRowStyleSheet {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            shadow_offset: Default::default(),
            background: if self.selected {
                // light green
                Some(Background::Color(Color::from_rgb8(0xE8, 0xF5, 0xE9)))
            } else {
                None
            },
            text_color: Color::BLACK,
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 16.0.into(),
            },
            shadow: Shadow::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> Appearance {
        let active = self.active(style);

        Appearance {
            background: active.background.or(Some(Background::Color(Color::from_rgb8(0xF5, 0xF5, 0xF5)))),
            ..active
        }
    }
}
