//! Rendering styles, pass strategies, and track layout.
//!
//! A [`Style`] describes how one sampled frame becomes one column of the
//! output image. A [`Track`] is one horizontal band of the output, rendered
//! with its own style and height. [`layout_tracks`] splits the total output
//! height between an ordered list of styles.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::Error;

/// The transform applied to each sampled frame to produce a column image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    /// Scale each frame to a 1-pixel-wide column. The classic "movie
    /// barcode".
    Horizontal,
    /// Scale each frame to a 1-pixel-tall row, then rotate it into a
    /// column, so the frame's horizontal axis runs down the output.
    Vertical,
    /// Scale each frame to the track height preserving aspect ratio,
    /// producing a strip of small thumbnails.
    Thumbnails,
    /// Take a single moving vertical slit from each frame, sweeping across
    /// the frame as the output progresses.
    Slitscan,
    /// Take the vertical slit at the frame's horizontal midpoint.
    MiddleColumn,
    /// Render a frequency-magnitude column from the audio track.
    Spectrogram,
}

impl Style {
    /// All known styles, in declaration order.
    pub const ALL: [Style; 6] = [
        Style::Horizontal,
        Style::Vertical,
        Style::Thumbnails,
        Style::Slitscan,
        Style::MiddleColumn,
        Style::Spectrogram,
    ];

    /// Returns `true` if this style samples the audio stream instead of the
    /// video stream.
    pub fn is_audio(self) -> bool {
        matches!(self, Style::Spectrogram)
    }

    /// The canonical lowercase name, as accepted by [`Style::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Style::Horizontal => "horizontal",
            Style::Vertical => "vertical",
            Style::Thumbnails => "thumbnails",
            Style::Slitscan => "slitscan",
            Style::MiddleColumn => "middlecolumn",
            Style::Spectrogram => "spectrogram",
        }
    }
}

impl Display for Style {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "horizontal" => Ok(Style::Horizontal),
            "vertical" => Ok(Style::Vertical),
            "thumbnails" => Ok(Style::Thumbnails),
            "slitscan" => Ok(Style::Slitscan),
            "middlecolumn" => Ok(Style::MiddleColumn),
            "spectrogram" => Ok(Style::Spectrogram),
            other => Err(format!(
                "Unknown style '{other}' (expected one of: horizontal, vertical, thumbnails, slitscan, middlecolumn, spectrogram)"
            )),
        }
    }
}

/// How the generation pipeline balances speed against frame accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Run the cheapest set of passes that produces a complete image. This
    /// is the default.
    #[default]
    Fast,
    /// Prefer frame-accurate output. Pass selection is identical to
    /// [`Fast`](Strategy::Fast): an exact pass runs whenever the source
    /// reports that exact-mode decoding applies.
    Exact,
    /// Always render a coarse approximate pass first so a preview is
    /// visible early, refining it with an exact pass when applicable.
    Live,
}

impl Strategy {
    /// The canonical lowercase name, as accepted by [`Strategy::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Fast => "fast",
            Strategy::Exact => "exact",
            Strategy::Live => "live",
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fast" => Ok(Strategy::Fast),
            "exact" => Ok(Strategy::Exact),
            "live" => Ok(Strategy::Live),
            other => Err(format!(
                "Unknown strategy '{other}' (expected one of: fast, exact, live)"
            )),
        }
    }
}

/// One horizontal band of the output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    /// The rendering style for this band.
    pub style: Style,
    /// The band's height in pixels. Track heights always sum to the
    /// session's total output height.
    pub height: u32,
}

/// Split `height` pixel rows between one track per style.
///
/// Every track gets `height / N` rows; the first track additionally absorbs
/// the division remainder, so the heights sum to exactly `height`.
///
/// # Errors
///
/// Returns [`Error::TooManyTracks`] if there are more styles than pixel
/// rows (every track needs at least one row). An empty style list is
/// rejected the same way.
pub fn layout_tracks(height: u32, styles: &[Style]) -> Result<Vec<Track>, Error> {
    if styles.is_empty() || styles.len() > height as usize {
        return Err(Error::TooManyTracks {
            tracks: styles.len(),
            height,
        });
    }

    let base = height / styles.len() as u32;
    let mut tracks: Vec<Track> = styles
        .iter()
        .map(|&style| Track {
            style,
            height: base,
        })
        .collect();
    tracks[0].height = height - (styles.len() as u32 - 1) * base;

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_names_round_trip() {
        for style in Style::ALL {
            assert_eq!(style.name().parse::<Style>().unwrap(), style);
        }
        assert!("barcode".parse::<Style>().is_err());
        assert_eq!("SPECTROGRAM".parse::<Style>().unwrap(), Style::Spectrogram);
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [Strategy::Fast, Strategy::Exact, Strategy::Live] {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
        }
        assert!("turbo".parse::<Strategy>().is_err());
    }

    #[test]
    fn single_track_takes_full_height() {
        let tracks = layout_tracks(150, &[Style::Horizontal]).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].height, 150);
    }

    #[test]
    fn first_track_absorbs_remainder() {
        let styles = [Style::Horizontal, Style::Vertical, Style::Slitscan];
        let tracks = layout_tracks(100, &styles).unwrap();
        assert_eq!(tracks[0].height, 100 - 2 * 33);
        assert_eq!(tracks[1].height, 33);
        assert_eq!(tracks[2].height, 33);
        let total: u32 = tracks.iter().map(|t| t.height).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn heights_always_sum_to_total() {
        for height in 1..40 {
            for count in 1..=height as usize {
                let styles = vec![Style::Horizontal; count];
                let tracks = layout_tracks(height, &styles).unwrap();
                let total: u32 = tracks.iter().map(|t| t.height).sum();
                assert_eq!(total, height, "height={height} count={count}");
                assert!(tracks.iter().all(|t| t.height >= 1));
            }
        }
    }

    #[test]
    fn too_many_tracks_rejected() {
        let styles = vec![Style::Horizontal; 11];
        assert!(matches!(
            layout_tracks(10, &styles),
            Err(Error::TooManyTracks {
                tracks: 11,
                height: 10
            })
        ));
        assert!(layout_tracks(10, &[]).is_err());
    }
}
