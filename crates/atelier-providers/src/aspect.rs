//! Mapping requested aspect ratios onto what each vendor can render

use atelier_core::AspectRatio;

/// Log-space distance below which a size counts as an exact match
const EXACT_TOLERANCE: f64 = 0.01;

/// Output sizes accepted by the `OpenAI` image endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Square,
    Landscape,
    Portrait,
}

impl ImageSize {
    pub const ALL: [Self; 3] = [Self::Square, Self::Landscape, Self::Portrait];

    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (1024, 1024),
            Self::Landscape => (1536, 1024),
            Self::Portrait => (1024, 1536),
        }
    }

    /// Wire value for the `size` parameter
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1536x1024",
            Self::Portrait => "1024x1536",
        }
    }

    fn ratio(self) -> f64 {
        let (width, height) = self.dimensions();
        f64::from(width) / f64::from(height)
    }

    /// Closest size to `aspect`, compared in log space so 2:1 and 1:2 are
    /// equally far from square
    pub fn nearest(aspect: AspectRatio) -> SizeMatch {
        let target = aspect.ratio().ln();

        let (size, distance) = Self::ALL
            .into_iter()
            .map(|size| (size, (size.ratio().ln() - target).abs()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap_or((Self::Square, f64::INFINITY));

        SizeMatch {
            size,
            exact: distance < EXACT_TOLERANCE,
        }
    }
}

/// Chosen output size and whether it matches the requested ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMatch {
    pub size: ImageSize,
    pub exact: bool,
}

/// Prompt text asking for a specific aspect ratio
pub fn aspect_directive(aspect: AspectRatio) -> String {
    format!("Compose the image with an aspect ratio of exactly {aspect}.")
}

/// Prompt text asking for the composition to be letterboxed inside a
/// canvas of a different shape
pub fn letterbox_directive(aspect: AspectRatio, size: ImageSize) -> String {
    let (width, height) = size.dimensions();
    format!(
        "The canvas is {width}x{height}. Keep the subject inside a centered {aspect} area \
         and fill the rest of the canvas with plain, solid-color letterbox bars."
    )
}

/// Append aspect instructions to a prompt for a vendor with fixed sizes
///
/// Returns the prompt and the size to request.
pub fn sized_prompt(prompt: &str, aspect: AspectRatio) -> (String, ImageSize) {
    let matched = ImageSize::nearest(aspect);
    let mut text = format!("{prompt}\n\n{}", aspect_directive(aspect));

    if !matched.exact {
        text.push(' ');
        text.push_str(&letterbox_directive(aspect, matched.size));
    }

    (text, matched.size)
}

/// Append aspect instructions to a prompt for a vendor without a size
/// parameter
pub fn free_prompt(prompt: &str, aspect: AspectRatio) -> String {
    format!("{prompt}\n\n{}", aspect_directive(aspect))
}
