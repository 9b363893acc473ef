//! Video tuning for one content
//!
//! Bitrate goes to the session. MTU and manual keyframe mode are applied per
//! element through a hook the engine calls from its own threads, so those
//! two values live in atomics shared with the hook.

use crate::error::MediaError;
use callbridge_core::{
    ElementAddedHook, ElementParameter, EngineConference, EngineElement, EngineSession,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Element settings shared with engine threads
#[derive(Debug, Default)]
pub struct VideoTuning {
    mtu: AtomicU32,
    manual_keyframes: AtomicBool,
}

impl VideoTuning {
    /// Current MTU, 0 when unset
    pub fn mtu(&self) -> u32 {
        self.mtu.load(Ordering::Acquire)
    }

    /// Whether keyframes are only produced on request
    pub fn manual_keyframes(&self) -> bool {
        self.manual_keyframes.load(Ordering::Acquire)
    }

    fn has_work(&self) -> bool {
        self.mtu() > 0 || self.manual_keyframes()
    }
}

impl ElementAddedHook for VideoTuning {
    fn element_added(&self, element: &dyn EngineElement) {
        let mtu = self.mtu();
        let manual = self.manual_keyframes();
        if mtu == 0 && !manual {
            return;
        }

        if mtu > 0 && element.set_parameter(ElementParameter::Mtu, i64::from(mtu)).is_some() {
            info!("Setting {} as mtu on {}", mtu, element.name());
        }

        if manual {
            if element
                .set_parameter(ElementParameter::KeyIntMax, i64::from(i32::MAX))
                .is_some()
            {
                info!("Setting key-int-max to max on {}", element.name());
            }
            if element
                .set_parameter(ElementParameter::IntraPeriod, 0)
                .is_some()
            {
                info!("Setting intra-period to 0 on {}", element.name());
            }
        }
    }
}

/// Notification to surface to the embedding application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoNotice {
    /// The peer asked for a new resolution
    ResolutionChanged {
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// The peer asked for a new framerate
    FramerateChanged {
        /// Frames per second
        framerate: u32,
    },
    /// The local source has to be restarted with the new settings
    RestartSource,
}

/// Video control state of one content
#[derive(Debug)]
pub struct VideoControlAdapter {
    tuning: Arc<VideoTuning>,
    hook: Arc<dyn ElementAddedHook>,
    conference: Option<Arc<dyn EngineConference>>,
    hook_installed: bool,
    bitrate: u32,
    framerate: u32,
    width: u32,
    height: u32,
}

impl Default for VideoControlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoControlAdapter {
    /// Adapter with every value unset
    pub fn new() -> Self {
        let tuning = Arc::new(VideoTuning::default());
        Self {
            hook: tuning.clone(),
            tuning,
            conference: None,
            hook_installed: false,
            bitrate: 0,
            framerate: 0,
            width: 0,
            height: 0,
        }
    }

    /// Take the values from the initial property dump
    pub fn apply_initial(
        &mut self,
        bitrate: u32,
        mtu: u32,
        manual_keyframes: bool,
        width: u32,
        height: u32,
    ) -> Vec<VideoNotice> {
        self.bitrate = bitrate;
        self.tuning.mtu.store(mtu, Ordering::Release);
        self.tuning
            .manual_keyframes
            .store(manual_keyframes, Ordering::Release);
        self.set_resolution(width, height)
    }

    /// Install the element hook on `conference`
    pub fn attach(&mut self, conference: &Arc<dyn EngineConference>) {
        self.detach();
        conference.add_element_hook(self.hook.clone());
        self.conference = Some(conference.clone());
        self.hook_installed = true;
    }

    /// Remove the element hook
    pub fn detach(&mut self) {
        if let Some(conference) = self.conference.take() {
            if self.hook_installed {
                conference.remove_element_hook(&self.hook);
            }
        }
        self.hook_installed = false;
    }

    /// Apply stored settings to a fresh session
    pub fn on_session_created(&self, session: &Arc<dyn EngineSession>) {
        if self.bitrate > 0 {
            session.set_send_bitrate(self.bitrate);
        }
    }

    /// New target bitrate; 0 only records the value
    pub fn set_bitrate(&mut self, bitrate: u32, session: Option<&Arc<dyn EngineSession>>) {
        info!("Setting bitrate to {} bits/s", bitrate);
        self.bitrate = bitrate;
        if let Some(session) = session {
            if bitrate > 0 {
                session.set_send_bitrate(bitrate);
            }
        }
    }

    /// New MTU; reinstalls the hook so existing elements pick it up
    pub fn set_mtu(&mut self, mtu: u32) {
        self.tuning.mtu.store(mtu, Ordering::Release);

        let Some(conference) = self.conference.clone() else {
            return;
        };
        if self.hook_installed {
            conference.remove_element_hook(&self.hook);
            self.hook_installed = false;
        }
        if self.tuning.has_work() {
            conference.add_element_hook(self.hook.clone());
            self.hook_installed = true;
        }
    }

    /// New framerate
    pub fn set_framerate(&mut self, framerate: u32) -> Vec<VideoNotice> {
        info!("Updated framerate requested: {}", framerate);
        self.framerate = framerate;
        vec![
            VideoNotice::FramerateChanged { framerate },
            VideoNotice::RestartSource,
        ]
    }

    /// New resolution; a zero dimension means unset and changes nothing
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Vec<VideoNotice> {
        if width == 0 || height == 0 {
            return Vec::new();
        }

        self.width = width;
        self.height = height;
        info!("Requested video resolution: {}x{}", width, height);
        vec![
            VideoNotice::ResolutionChanged { width, height },
            VideoNotice::RestartSource,
        ]
    }

    /// Ask for a keyframe; without a session this does nothing
    pub fn request_keyframe(&self, session: Option<&Arc<dyn EngineSession>>) {
        let Some(session) = session else {
            return;
        };

        info!("Sending out a keyframe request");
        if let Err(source) = session.request_keyframe() {
            warn!("{}", MediaError::Keyframe { source });
        }
    }

    /// Shared element settings
    pub fn tuning(&self) -> &Arc<VideoTuning> {
        &self.tuning
    }

    /// Whether the element hook is installed
    pub fn hook_installed(&self) -> bool {
        self.hook_installed
    }

    /// Target bitrate
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Requested framerate
    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    /// Requested resolution
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct Payloader {
        values: Mutex<HashMap<ElementParameter, i64>>,
        supported: Vec<ElementParameter>,
    }

    impl EngineElement for Payloader {
        fn name(&self) -> String {
            "rtpvp8pay0".to_string()
        }

        fn set_parameter(&self, parameter: ElementParameter, value: i64) -> Option<()> {
            if !self.supported.contains(&parameter) {
                return None;
            }
            self.values.lock().insert(parameter, value);
            Some(())
        }
    }

    #[test]
    fn test_zero_resolution_is_unset() {
        let mut adapter = VideoControlAdapter::new();
        assert!(adapter.set_resolution(0, 0).is_empty());
        assert!(adapter.set_resolution(640, 0).is_empty());
        assert_eq!(adapter.resolution(), (0, 0));
    }

    #[test]
    fn test_resolution_emits_once_each() {
        let mut adapter = VideoControlAdapter::new();
        let notices = adapter.set_resolution(640, 480);
        assert_eq!(
            notices,
            vec![
                VideoNotice::ResolutionChanged {
                    width: 640,
                    height: 480
                },
                VideoNotice::RestartSource
            ]
        );
    }

    #[test]
    fn test_hook_applies_only_supported_parameters() {
        let mut adapter = VideoControlAdapter::new();
        adapter.apply_initial(0, 1200, true, 0, 0);

        let element = Payloader {
            supported: vec![ElementParameter::Mtu, ElementParameter::IntraPeriod],
            ..Payloader::default()
        };
        adapter.tuning().element_added(&element);

        let values = element.values.lock();
        assert_eq!(values.get(&ElementParameter::Mtu), Some(&1200));
        assert_eq!(values.get(&ElementParameter::IntraPeriod), Some(&0));
        assert!(!values.contains_key(&ElementParameter::KeyIntMax));
    }

    #[test]
    fn test_hook_idle_without_settings() {
        let adapter = VideoControlAdapter::new();
        let element = Payloader {
            supported: vec![ElementParameter::Mtu],
            ..Payloader::default()
        };
        adapter.tuning().element_added(&element);
        assert!(element.values.lock().is_empty());
    }
}
