//! Routing Scenario Tests
//!
//! Drives a controller through realistic call sequences using the in-memory
//! ports:
//! - proximity switching between earpiece and loudspeaker
//! - wired headset plug/unplug and user selection remapping
//! - Bluetooth headset discovery, audio link setup and teardown
//! - invalid calls and session restarts

mod common;

use callroute_core::platform::mock_impl::{MockAudioPlatform, MockBluetooth, MAX_SCO_CONNECTION_ATTEMPTS};
use callroute_core::{AudioDevice, AudioFocusChange, BluetoothState, Lifecycle, RouteError, SpeakerphonePreference};

use common::Harness;

#[test]
fn test_proximity_switches_builtin_outputs() {
    let mut h = Harness::new();
    h.start();
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);
    assert!(h.available().is_exactly(&[AudioDevice::Earpiece, AudioDevice::SpeakerPhone]));

    assert!(h.proximity.set_near(false));
    assert_eq!(h.pump(), 1);
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);
    assert_eq!(h.notifications(), 1, "far reading with loudspeaker selected is not a change");

    assert!(h.proximity.set_near(true));
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Earpiece);
    assert_eq!(h.notifications(), 2);
    assert!(!h.platform.inspect().speakerphone_on);

    for _ in 0..3 {
        h.proximity.set_near(true);
    }
    assert_eq!(h.pump(), 3);
    assert_eq!(h.notifications(), 2, "repeated near readings must not toggle the route");

    h.proximity.set_near(false);
    h.pump();
    assert_eq!(
        h.selections(),
        vec![AudioDevice::SpeakerPhone, AudioDevice::Earpiece, AudioDevice::SpeakerPhone]
    );
    assert!(h.platform.inspect().speakerphone_on);
}

#[test]
fn test_proximity_follows_runtime_preference() {
    let mut h = Harness::with_ports(MockAudioPlatform::new(), MockBluetooth::new(), SpeakerphonePreference::On);
    h.start();

    h.proximity.set_near(true);
    h.pump();
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone, "proximity switching is off unless auto");

    h.preferences.set_speakerphone(SpeakerphonePreference::Auto);
    h.proximity.set_near(true);
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Earpiece);
}

#[test]
fn test_wired_headset_replaces_builtin_outputs() {
    let mut h = Harness::new();
    h.start();

    h.controller.select_audio_device(AudioDevice::SpeakerPhone).unwrap();
    assert_eq!(h.controller.user_selected_audio_device(), AudioDevice::SpeakerPhone);

    assert!(h.platform.plug_headset(true));
    h.pump();
    assert!(h.available().is_exactly(&[AudioDevice::WiredHeadset]));
    assert_eq!(h.selected(), AudioDevice::WiredHeadset);
    assert_eq!(h.controller.user_selected_audio_device(), AudioDevice::WiredHeadset);
    assert!(!h.platform.inspect().speakerphone_on);

    let result = h.controller.select_audio_device(AudioDevice::SpeakerPhone);
    assert_eq!(result, Err(RouteError::DeviceUnavailable { device: AudioDevice::SpeakerPhone }));

    h.platform.plug_headset(false);
    h.pump();
    assert_eq!(h.controller.user_selected_audio_device(), AudioDevice::SpeakerPhone);
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);
    assert_eq!(
        h.selections(),
        vec![AudioDevice::SpeakerPhone, AudioDevice::WiredHeadset, AudioDevice::SpeakerPhone]
    );
}

#[test]
fn test_wired_headset_present_at_start() {
    let mut h = Harness::with_ports(
        MockAudioPlatform::new().with_wired_headset(),
        MockBluetooth::new(),
        SpeakerphonePreference::Auto,
    );
    h.start();

    assert_eq!(h.selections(), vec![AudioDevice::WiredHeadset]);
    assert!(h.available().is_exactly(&[AudioDevice::WiredHeadset]));
}

#[test]
fn test_bluetooth_selected_once_audio_link_connects() {
    let mut h = Harness::with_ports(
        MockAudioPlatform::new(),
        MockBluetooth::new().with_headset(),
        SpeakerphonePreference::Auto,
    );
    h.start();

    let bluetooth = h.bluetooth.inspect();
    assert_eq!(bluetooth.state, BluetoothState::ScoConnecting);
    assert_eq!(bluetooth.link_requests, 1, "link start attempted with no user selection");
    assert!(h.available().contains(AudioDevice::Bluetooth));
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone, "not routed until the link is connected");

    assert!(h.bluetooth.audio_connected());
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Bluetooth);
    assert!(!h.platform.inspect().speakerphone_on);
    assert_eq!(h.selections(), vec![AudioDevice::SpeakerPhone, AudioDevice::Bluetooth]);

    // A wired headset does not outrank a connected Bluetooth link
    h.platform.plug_headset(true);
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Bluetooth);
    assert!(h.available().is_exactly(&[AudioDevice::WiredHeadset, AudioDevice::Bluetooth]));
}

#[test]
fn test_bluetooth_headset_comes_and_goes() {
    let mut h = Harness::new();
    h.start();
    assert_eq!(h.bluetooth.inspect().state, BluetoothState::HeadsetUnavailable);

    assert!(h.bluetooth.connect_headset());
    h.pump();
    assert_eq!(h.bluetooth.inspect().state, BluetoothState::ScoConnecting);
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);

    h.bluetooth.audio_connected();
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Bluetooth);

    assert!(h.bluetooth.disconnect_headset());
    h.pump();
    assert_eq!(h.bluetooth.inspect().state, BluetoothState::HeadsetUnavailable);
    assert!(!h.available().contains(AudioDevice::Bluetooth));
    assert_eq!(
        h.selections(),
        vec![AudioDevice::SpeakerPhone, AudioDevice::Bluetooth, AudioDevice::SpeakerPhone]
    );
}

#[test]
fn test_bluetooth_user_selection_reset_when_headset_leaves() {
    let mut h = Harness::with_ports(
        MockAudioPlatform::new(),
        MockBluetooth::new().with_headset(),
        SpeakerphonePreference::Auto,
    );
    h.start();
    h.bluetooth.audio_connected();
    h.pump();

    h.controller.select_audio_device(AudioDevice::Bluetooth).unwrap();
    assert_eq!(h.controller.user_selected_audio_device(), AudioDevice::Bluetooth);

    h.bluetooth.disconnect_headset();
    h.pump();
    assert_eq!(h.controller.user_selected_audio_device(), AudioDevice::None);
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);
}

#[test]
fn test_selecting_builtin_output_tears_down_bluetooth_link() {
    let mut h = Harness::with_ports(
        MockAudioPlatform::new(),
        MockBluetooth::new().with_headset(),
        SpeakerphonePreference::Auto,
    );
    h.start();
    h.bluetooth.audio_connected();
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Bluetooth);

    h.controller.select_audio_device(AudioDevice::Earpiece).unwrap();

    let bluetooth = h.bluetooth.inspect();
    assert_eq!(bluetooth.link_stops, 1);
    assert_eq!(bluetooth.state, BluetoothState::HeadsetAvailable, "device refreshed after the stop");
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone, "falls back to the default device");

    // The link stays down while the user keeps a non-Bluetooth choice
    h.proximity.set_near(false);
    h.pump();
    assert_eq!(h.bluetooth.inspect().link_requests, 1);

    h.controller.select_audio_device(AudioDevice::Bluetooth).unwrap();
    assert_eq!(h.bluetooth.inspect().link_requests, 2);
    assert_eq!(h.bluetooth.inspect().state, BluetoothState::ScoConnecting);
}

#[test]
fn test_failed_link_start_withdraws_bluetooth() {
    let bluetooth = MockBluetooth::new().with_headset();
    bluetooth.fail_link_start(true);
    let mut h = Harness::with_ports(MockAudioPlatform::new(), bluetooth, SpeakerphonePreference::Auto);
    h.start();

    assert!(!h.available().contains(AudioDevice::Bluetooth));
    assert!(h.available().is_exactly(&[AudioDevice::Earpiece, AudioDevice::SpeakerPhone]));
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);

    let result = h.controller.select_audio_device(AudioDevice::Bluetooth);
    assert!(matches!(result, Err(RouteError::DeviceUnavailable { .. })));
}

#[test]
fn test_link_attempts_exhausted_until_headset_reconnects() {
    let mut h = Harness::with_ports(
        MockAudioPlatform::new(),
        MockBluetooth::new().with_headset(),
        SpeakerphonePreference::Auto,
    );
    h.start();

    for _ in 1..MAX_SCO_CONNECTION_ATTEMPTS {
        assert!(h.bluetooth.audio_link_timeout());
        h.pump();
        assert_eq!(h.bluetooth.inspect().state, BluetoothState::ScoConnecting);
    }

    assert!(h.bluetooth.audio_link_timeout());
    h.pump();
    assert_eq!(h.bluetooth.inspect().link_requests as u32, MAX_SCO_CONNECTION_ATTEMPTS);
    assert!(!h.available().contains(AudioDevice::Bluetooth));
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);

    assert!(h.bluetooth.connect_headset());
    h.pump();
    assert_eq!(h.bluetooth.inspect().state, BluetoothState::ScoConnecting);
    assert!(h.available().contains(AudioDevice::Bluetooth));
}

#[test]
fn test_unavailable_earpiece_selection_rejected() {
    let mut h = Harness::with_ports(
        MockAudioPlatform::without_earpiece(),
        MockBluetooth::new(),
        SpeakerphonePreference::Auto,
    );
    h.start();
    assert!(h.available().is_exactly(&[AudioDevice::SpeakerPhone]));

    let result = h.controller.select_audio_device(AudioDevice::Earpiece);
    assert_eq!(result, Err(RouteError::DeviceUnavailable { device: AudioDevice::Earpiece }));
    assert_eq!(h.notifications(), 1);

    assert_eq!(h.controller.set_default_audio_device(AudioDevice::Earpiece), Ok(AudioDevice::SpeakerPhone));
    assert_eq!(h.notifications(), 1);
}

#[test]
fn test_toggle_between_builtin_outputs() {
    let mut h = Harness::new();
    h.start();

    h.controller.toggle_audio_device(AudioDevice::Earpiece).unwrap();
    assert_eq!(h.controller.default_audio_device(), AudioDevice::Earpiece);
    assert_eq!(h.selected(), AudioDevice::Earpiece);

    h.controller.toggle_audio_device(AudioDevice::SpeakerPhone).unwrap();
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);
    assert_eq!(
        h.selections(),
        vec![AudioDevice::SpeakerPhone, AudioDevice::Earpiece, AudioDevice::SpeakerPhone]
    );

    let result = h.controller.toggle_audio_device(AudioDevice::Bluetooth);
    assert!(matches!(result, Err(RouteError::UnsupportedDevice { .. })));

    h.platform.plug_headset(true);
    h.pump();
    let result = h.controller.toggle_audio_device(AudioDevice::SpeakerPhone);
    assert_eq!(result, Err(RouteError::DeviceUnavailable { device: AudioDevice::SpeakerPhone }));
    assert_eq!(h.selected(), AudioDevice::WiredHeadset);
}

#[test]
fn test_rejected_toggle_keeps_default() {
    let mut h = Harness::new();
    h.start();
    h.platform.plug_headset(true);
    h.pump();
    let before = h.controller.snapshot();
    let notified = h.notifications();

    let result = h.controller.toggle_audio_device(AudioDevice::Earpiece);

    assert_eq!(result, Err(RouteError::DeviceUnavailable { device: AudioDevice::Earpiece }));
    assert_eq!(h.controller.default_audio_device(), AudioDevice::SpeakerPhone);
    assert_eq!(h.controller.snapshot(), before);
    assert_eq!(h.notifications(), notified);

    // Once the headset is gone the same toggle goes through
    h.platform.plug_headset(false);
    h.pump();
    h.controller.toggle_audio_device(AudioDevice::Earpiece).unwrap();
    assert_eq!(h.controller.default_audio_device(), AudioDevice::Earpiece);
    assert_eq!(h.selected(), AudioDevice::Earpiece);
}

#[test]
fn test_reevaluation_is_idempotent() {
    let mut h = Harness::new();
    h.start();
    let writes = h.platform.inspect().speakerphone_writes;

    h.controller.update_audio_device_state();
    h.controller.update_audio_device_state();

    assert_eq!(h.notifications(), 1);
    assert_eq!(h.platform.inspect().speakerphone_writes, writes);
}

#[test]
fn test_audio_focus_changes_do_not_reroute() {
    let mut h = Harness::new();
    h.start();

    assert!(h.platform.change_focus(AudioFocusChange::LossTransient));
    assert!(h.platform.change_focus(AudioFocusChange::Gain));
    assert_eq!(h.pump(), 2);
    assert_eq!(h.notifications(), 1);
}

#[test]
fn test_double_stop_and_restart() {
    let mut h = Harness::new();
    h.start();
    h.proximity.set_near(true);
    h.pump();
    assert_eq!(h.selected(), AudioDevice::Earpiece);

    h.controller.stop();
    let after_stop = h.platform.inspect();
    h.controller.stop();
    assert_eq!(h.controller.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(h.platform.inspect().speakerphone_writes, after_stop.speakerphone_writes);
    assert!(!h.platform.plug_headset(false), "headset events are unsubscribed after stop");
    assert!(!h.proximity.inspect().running);

    // A new session starts from scratch, without the old proximity reading
    h.start();
    assert_eq!(h.selected(), AudioDevice::SpeakerPhone);
    assert_eq!(h.proximity.inspect().starts, 2);
    assert_eq!(
        h.selections(),
        vec![AudioDevice::SpeakerPhone, AudioDevice::Earpiece, AudioDevice::SpeakerPhone]
    );
}

#[test]
fn test_release_after_stop() {
    let mut h = Harness::new();
    h.start();
    h.controller.stop();

    h.controller.release();
    h.controller.release();

    assert!(h.bluetooth.inspect().released);
    assert!(h.controller.audio_devices().is_empty());
    assert_eq!(h.controller.selected_audio_device(), AudioDevice::None);
}
