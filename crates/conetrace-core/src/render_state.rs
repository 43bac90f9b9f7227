//! Render path and debug channel selection.

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentKind;

/// Which render path draws the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RenderPath {
    /// Single lit pass straight to the screen.
    Forward,
    /// Voxel volume drawn as a point cloud.
    VoxelDebug,
    /// G-buffer, cone-traced indirect light and composite.
    #[default]
    Deferred,
}

/// Which deferred attachment is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RenderChannel {
    #[default]
    Final,
    NormalMap,
    Indirect,
    Reflection,
    Color,
    Lighting,
    Specular,
}

impl RenderChannel {
    /// The attachment blitted to the screen for this channel.
    ///
    /// `Indirect` shows the blurred indirect light, `Specular` the glow
    /// written by the direct-light pass.
    #[must_use]
    pub fn attachment(self) -> AttachmentKind {
        match self {
            RenderChannel::Final => AttachmentKind::Final,
            RenderChannel::NormalMap => AttachmentKind::Normal,
            RenderChannel::Indirect => AttachmentKind::Blur,
            RenderChannel::Reflection => AttachmentKind::Glossy,
            RenderChannel::Color => AttachmentKind::Color,
            RenderChannel::Lighting => AttachmentKind::Light,
            RenderChannel::Specular => AttachmentKind::Specular,
        }
    }
}

/// Combined selector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RenderState {
    pub path: RenderPath,
    pub channel: RenderChannel,
}

/// Result of feeding a digit to the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Not a digit the selector knows.
    Ignored,
    /// Same path and channel as before.
    Unchanged,
    /// Deferred path kept; only the presented attachment changes.
    ChannelOnly {
        from: RenderChannel,
        to: RenderChannel,
    },
    /// A different render path is now active.
    PathChanged { from: RenderPath, to: RenderPath },
}

impl Transition {
    /// Whether the next frame must run passes rather than re-present.
    #[must_use]
    pub fn needs_render(self) -> bool {
        matches!(self, Transition::PathChanged { .. })
    }
}

/// Owned state machine over [`RenderState`].
///
/// Starts at deferred/final; changes only through [`handle_digit`](Self::handle_digit).
#[derive(Debug, Clone, Default)]
pub struct RenderPathSelector {
    state: RenderState,
}

impl RenderPathSelector {
    /// Creates a selector in the deferred/final state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Active render path.
    pub fn path(&self) -> RenderPath {
        self.state.path
    }

    /// Selected debug channel.
    pub fn channel(&self) -> RenderChannel {
        self.state.channel
    }

    /// The state a digit leads to from `current`, or `None` for non-digits.
    ///
    /// `1` and `2` keep the current channel so that returning to the deferred
    /// path with `3`..`9` is the only way to pick one.
    pub fn target_for_digit(current: RenderState, digit: u8) -> Option<RenderState> {
        let deferred = |channel| RenderState {
            path: RenderPath::Deferred,
            channel,
        };
        let state = match digit {
            0 | 3 => deferred(RenderChannel::Final),
            1 => RenderState {
                path: RenderPath::Forward,
                channel: current.channel,
            },
            2 => RenderState {
                path: RenderPath::VoxelDebug,
                channel: current.channel,
            },
            4 => deferred(RenderChannel::NormalMap),
            5 => deferred(RenderChannel::Indirect),
            6 => deferred(RenderChannel::Reflection),
            7 => deferred(RenderChannel::Color),
            8 => deferred(RenderChannel::Lighting),
            9 => deferred(RenderChannel::Specular),
            _ => return None,
        };
        Some(state)
    }

    /// Applies a digit key and reports what changed.
    pub fn handle_digit(&mut self, digit: u8) -> Transition {
        let Some(next) = Self::target_for_digit(self.state, digit) else {
            return Transition::Ignored;
        };
        let previous = std::mem::replace(&mut self.state, next);

        let transition = if previous.path != next.path {
            Transition::PathChanged {
                from: previous.path,
                to: next.path,
            }
        } else if previous.channel != next.channel {
            Transition::ChannelOnly {
                from: previous.channel,
                to: next.channel,
            }
        } else {
            Transition::Unchanged
        };
        log::debug!("render state {previous:?} -> {next:?} ({transition:?})");
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let selector = RenderPathSelector::new();
        assert_eq!(selector.path(), RenderPath::Deferred);
        assert_eq!(selector.channel(), RenderChannel::Final);
    }

    #[test]
    fn test_digit_table() {
        let expected = [
            (0, RenderChannel::Final),
            (3, RenderChannel::Final),
            (4, RenderChannel::NormalMap),
            (5, RenderChannel::Indirect),
            (6, RenderChannel::Reflection),
            (7, RenderChannel::Color),
            (8, RenderChannel::Lighting),
            (9, RenderChannel::Specular),
        ];
        for (digit, channel) in expected {
            let mut selector = RenderPathSelector::new();
            selector.handle_digit(1);
            selector.handle_digit(digit);
            assert_eq!(selector.path(), RenderPath::Deferred, "digit {digit}");
            assert_eq!(selector.channel(), channel, "digit {digit}");
        }
    }

    #[test]
    fn test_forward_and_voxel_keep_channel() {
        let mut selector = RenderPathSelector::new();
        selector.handle_digit(6);
        assert_eq!(
            selector.handle_digit(1),
            Transition::PathChanged {
                from: RenderPath::Deferred,
                to: RenderPath::Forward
            }
        );
        assert_eq!(selector.channel(), RenderChannel::Reflection);
        selector.handle_digit(2);
        assert_eq!(selector.path(), RenderPath::VoxelDebug);
        assert_eq!(selector.channel(), RenderChannel::Reflection);
    }

    #[test]
    fn test_channel_only_transition() {
        let mut selector = RenderPathSelector::new();
        let t = selector.handle_digit(4);
        assert_eq!(
            t,
            Transition::ChannelOnly {
                from: RenderChannel::Final,
                to: RenderChannel::NormalMap
            }
        );
        assert!(!t.needs_render());
    }

    #[test]
    fn test_repeat_and_invalid_digits() {
        let mut selector = RenderPathSelector::new();
        assert_eq!(selector.handle_digit(3), Transition::Unchanged);
        assert_eq!(selector.handle_digit(0), Transition::Unchanged);
        assert_eq!(selector.handle_digit(10), Transition::Ignored);
        assert_eq!(selector.state(), RenderState::default());
    }

    #[test]
    fn test_channel_attachments() {
        assert_eq!(RenderChannel::Indirect.attachment(), AttachmentKind::Blur);
        assert_eq!(RenderChannel::Specular.attachment(), AttachmentKind::Specular);
        assert_eq!(RenderChannel::NormalMap.attachment(), AttachmentKind::Normal);
    }
}
