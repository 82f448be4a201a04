//! Watermark anchor positions and paste-offset computation.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Distance in pixels kept between the watermark and the image edges for every
/// anchor except [`Anchor::Center`].
pub const MARGIN: i64 = 10;

/// Where the watermark is placed on the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    /// Bottom-right corner.
    #[default]
    BottomRight,
    /// Horizontally centered along the bottom edge.
    BottomCenter,
    /// Bottom-left corner.
    BottomLeft,
    /// Top-right corner.
    TopRight,
    /// Top-left corner.
    TopLeft,
    /// Centered on both axes, no margin.
    Center,
}

impl Anchor {
    /// Every anchor, in the order the desktop form lists them.
    pub const ALL: [Anchor; 6] = [
        Anchor::BottomRight,
        Anchor::BottomCenter,
        Anchor::BottomLeft,
        Anchor::TopRight,
        Anchor::TopLeft,
        Anchor::Center,
    ];

    /// Form-field name used by the web front end (`bottom_right`, ...).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Anchor::BottomRight => "bottom_right",
            Anchor::BottomCenter => "bottom_center",
            Anchor::BottomLeft => "bottom_left",
            Anchor::TopRight => "top_right",
            Anchor::TopLeft => "top_left",
            Anchor::Center => "center",
        }
    }

    /// Label shown in the desktop position selector.
    #[must_use]
    pub fn french_label(self) -> &'static str {
        match self {
            Anchor::BottomRight => "En bas à droite",
            Anchor::BottomCenter => "En bas au centre",
            Anchor::BottomLeft => "En bas à gauche",
            Anchor::TopRight => "En haut à droite",
            Anchor::TopLeft => "En haut à gauche",
            Anchor::Center => "Centre",
        }
    }

    /// Lenient lookup used by both front ends: unrecognized labels fall back
    /// to [`Anchor::BottomRight`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }

    fn matches(self, label: &str) -> bool {
        label.replace('-', "_").eq_ignore_ascii_case(self.name())
            || label.to_lowercase() == self.french_label().to_lowercase()
    }

    /// Top-left paste offset of a `wm_w`x`wm_h` watermark on an
    /// `image_w`x`image_h` image.
    ///
    /// The result is negative on an axis where the watermark (plus margin)
    /// does not fit. Halving uses floor division.
    #[must_use]
    pub fn offset(self, image_w: u32, image_h: u32, wm_w: u32, wm_h: u32) -> (i64, i64) {
        let (iw, ih) = (i64::from(image_w), i64::from(image_h));
        let (ww, wh) = (i64::from(wm_w), i64::from(wm_h));

        let right = iw - ww - MARGIN;
        let bottom = ih - wh - MARGIN;
        let center_x = (iw - ww).div_euclid(2);

        match self {
            Anchor::BottomRight => (right, bottom),
            Anchor::BottomCenter => (center_x, bottom),
            Anchor::BottomLeft => (MARGIN, bottom),
            Anchor::TopRight => (right, MARGIN),
            Anchor::TopLeft => (MARGIN, MARGIN),
            Anchor::Center => (center_x, (ih - wh).div_euclid(2)),
        }
    }

    /// Offset clamped so the watermark starts inside the image.
    ///
    /// On each axis the coordinate lies in `0..=image - wm`, or is `0` when the
    /// watermark is larger than the image; whatever still overflows is clipped
    /// by the compositor.
    #[must_use]
    pub fn position(self, image_w: u32, image_h: u32, wm_w: u32, wm_h: u32) -> (u32, u32) {
        let (x, y) = self.offset(image_w, image_h, wm_w, wm_h);
        (clamp_axis(x, image_w, wm_w), clamp_axis(y, image_h, wm_h))
    }
}

fn clamp_axis(offset: i64, image: u32, wm: u32) -> u32 {
    let max = image.saturating_sub(wm);
    u32::try_from(offset.clamp(0, i64::from(max))).unwrap_or(0)
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Anchor {
    type Err = Error;

    /// Strict parse: accepts web names (`bottom_right`, `bottom-right`, any
    /// case) and the French desktop labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|anchor| anchor.matches(label))
            .ok_or_else(|| Error::UnknownAnchor(s.to_string()))
    }
}
