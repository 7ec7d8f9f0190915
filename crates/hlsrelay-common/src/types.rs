//! Overlay value types.
//!
//! Overlays are boxes drawn over a stream by the player. Only their geometry
//! and content are stored here; rendering is a client concern.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an overlay displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// Plain text rendered by the player.
    Text,
    /// An image referenced by URL.
    Image,
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
        }
    }
}

impl std::str::FromStr for OverlayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            _ => Err(format!("Invalid overlay type: {}", s)),
        }
    }
}

/// Top-left corner of an overlay, in player pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 10.0, y: 10.0 }
    }
}

/// Width and height of an overlay, in player pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Default for Size {
    fn default() -> Self {
        Self { w: 150.0, h: 50.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_kind_serialization() {
        assert_eq!(serde_json::to_string(&OverlayKind::Text).unwrap(), r#""text""#);
        assert_eq!(serde_json::to_string(&OverlayKind::Image).unwrap(), r#""image""#);
    }

    #[test]
    fn test_overlay_kind_from_str() {
        assert_eq!("text".parse::<OverlayKind>(), Ok(OverlayKind::Text));
        assert_eq!("image".parse::<OverlayKind>(), Ok(OverlayKind::Image));
        assert!("video".parse::<OverlayKind>().is_err());
        assert!("Text".parse::<OverlayKind>().is_err());
    }

    #[test]
    fn test_geometry_defaults() {
        assert_eq!(Position::default(), Position { x: 10.0, y: 10.0 });
        assert_eq!(Size::default(), Size { w: 150.0, h: 50.0 });
    }

    #[test]
    fn test_geometry_accepts_integers() {
        let pos: Position = serde_json::from_str(r#"{"x": 20, "y": 5}"#).unwrap();
        assert_eq!(pos, Position { x: 20.0, y: 5.0 });
    }
}
