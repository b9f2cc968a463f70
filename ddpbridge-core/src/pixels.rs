//! Pixel state: the current and previous full frames, and interpolation between them

use crate::constants::BYTES_PER_PIXEL;
use bytes::Bytes;

/// One full frame of RGB triples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame(Bytes);

impl PixelFrame {
    /// Wrap raw RGB bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Frame of `led_count` pixels all set to one colour
    pub fn solid(led_count: usize, rgb: [u8; 3]) -> Self {
        let data: Vec<u8> = rgb.iter().copied().cycle().take(led_count * BYTES_PER_PIXEL).collect();
        Self(Bytes::from(data))
    }

    /// Raw RGB bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of pixels
    pub fn led_count(&self) -> usize {
        self.0.len() / BYTES_PER_PIXEL
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the frame holds no pixels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// RGB triple of pixel `index`
    pub fn pixel(&self, index: usize) -> Option<[u8; 3]> {
        let start = index * BYTES_PER_PIXEL;
        self.0
            .get(start..start + BYTES_PER_PIXEL)
            .map(|p| [p[0], p[1], p[2]])
    }
}

impl AsRef<[u8]> for PixelFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Current and previous frames for a fixed LED count
#[derive(Debug, Clone)]
pub struct PixelStore {
    led_count: usize,
    current: Option<PixelFrame>,
    previous: Option<PixelFrame>,
}

impl PixelStore {
    /// Empty store for `led_count` LEDs
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            current: None,
            previous: None,
        }
    }

    /// Configured LED count
    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Expected frame length in bytes
    pub fn frame_len(&self) -> usize {
        self.led_count * BYTES_PER_PIXEL
    }

    /// Shift `current` into `previous` and store the new frame
    ///
    /// Returns `false` and leaves the store untouched when `pixel_data`
    /// does not match the configured frame length.
    pub fn apply_update(&mut self, pixel_data: impl Into<Bytes>) -> bool {
        let data = pixel_data.into();
        if data.len() != self.frame_len() {
            return false;
        }
        self.previous = self.current.take();
        self.current = Some(PixelFrame(data));
        true
    }

    /// Latest accepted frame
    pub fn current(&self) -> Option<&PixelFrame> {
        self.current.as_ref()
    }

    /// Frame that was current before the latest update
    pub fn previous(&self) -> Option<&PixelFrame> {
        self.previous.as_ref()
    }

    /// Check if both endpoints for interpolation exist
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

/// Blend two equal-length frames at `step / steps`
///
/// Each channel is `previous + (current - previous) * step / steps`, with
/// the blended value truncated toward zero. `step == 0` yields `previous` and
/// `step == steps` yields `current` exactly.
pub fn interpolate(
    previous: &PixelFrame,
    current: &PixelFrame,
    step: u32,
    steps: u32,
) -> PixelFrame {
    debug_assert_eq!(previous.len(), current.len());
    debug_assert!(step <= steps && steps > 0);

    let data: Vec<u8> = previous
        .as_bytes()
        .iter()
        .zip(current.as_bytes())
        .map(|(&from, &to)| {
            let (from, to) = (i64::from(from), i64::from(to));
            let (step, steps) = (i64::from(step), i64::from(steps));
            // Numerator stays non-negative, so division truncates the whole value
            ((from * (steps - step) + to * step) / steps).clamp(0, 255) as u8
        })
        .collect();

    PixelFrame(Bytes::from(data))
}

/// Lazily yields the interpolated frames of one keyframe transition
///
/// Yields `steps + 1` frames in increasing step order, paired with the push
/// flag, which is set only on the final frame.
#[derive(Debug, Clone)]
pub struct Tween<'a> {
    previous: &'a PixelFrame,
    current: &'a PixelFrame,
    step: u32,
    steps: u32,
}

impl<'a> Tween<'a> {
    /// Transition from `previous` to `current` over `steps` intervals
    pub fn new(previous: &'a PixelFrame, current: &'a PixelFrame, steps: u32) -> Self {
        Self {
            previous,
            current,
            step: 0,
            steps: steps.max(1),
        }
    }
}

impl Iterator for Tween<'_> {
    type Item = (PixelFrame, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.step > self.steps {
            return None;
        }
        let step = self.step;
        self.step += 1;

        let frame = if step == self.steps {
            self.current.clone()
        } else {
            interpolate(self.previous, self.current, step, self.steps)
        };
        Some((frame, step == self.steps))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Tween<'_> {}
