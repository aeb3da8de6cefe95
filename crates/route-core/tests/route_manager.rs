//! Route Manager Integration Tests
//!
//! Exercises the routing thread through its async handle: command replies,
//! ordering between port events and commands, broadcast notifications and
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;

use callroute_core::platform::mock_impl::{MockAudioPlatform, MockBluetooth, MockProximity};
use callroute_core::{
    AudioDevice, DeviceSet, Lifecycle, RouteConfig, RouteError, RouteManager, RoutePorts, SpeakerphonePreference,
};

struct Fixture {
    manager: RouteManager,
    platform: MockAudioPlatform,
    bluetooth: MockBluetooth,
    proximity: MockProximity,
}

fn spawn(config: RouteConfig) -> Fixture {
    let platform = MockAudioPlatform::new();
    let bluetooth = MockBluetooth::new();
    let proximity = MockProximity::new();
    let ports = RoutePorts::new(platform.clone(), bluetooth.clone(), proximity.clone());
    let manager = RouteManager::spawn(ports, config).expect("routing thread should start");

    Fixture {
        manager,
        platform,
        bluetooth,
        proximity,
    }
}

#[tokio::test]
async fn test_start_publishes_initial_route() {
    let fixture = spawn(RouteConfig::default());
    let mut changes = fixture.manager.subscribe();
    let handle = fixture.manager.handle();

    handle.start().await.unwrap();

    let change = timeout(Duration::from_secs(1), changes.recv())
        .await
        .expect("change should be published")
        .unwrap();
    assert_eq!(change.selected, AudioDevice::SpeakerPhone);
    assert!(change.available.is_exactly(&[AudioDevice::SpeakerPhone, AudioDevice::Earpiece]));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.lifecycle, Lifecycle::Running);
    assert!(fixture.platform.inspect().communication_mode);

    handle.stop().await.unwrap();
    assert!(!fixture.platform.inspect().communication_mode);
    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_port_events_ordered_before_later_commands() {
    let fixture = spawn(RouteConfig::default());
    let handle = fixture.manager.handle();
    handle.start().await.unwrap();

    assert!(fixture.platform.plug_headset(true));
    assert_eq!(handle.selected_audio_device().await.unwrap(), AudioDevice::WiredHeadset);

    assert!(fixture.platform.plug_headset(false));
    assert!(fixture.proximity.set_near(true));
    assert_eq!(handle.selected_audio_device().await.unwrap(), AudioDevice::Earpiece);

    assert!(fixture.bluetooth.connect_headset());
    let available = handle.audio_devices().await.unwrap();
    assert!(available.contains(AudioDevice::Bluetooth));

    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_invalid_commands_are_rejected() {
    let fixture = spawn(RouteConfig::default());
    let handle = fixture.manager.handle();

    let result = handle.select_audio_device(AudioDevice::Earpiece).await;
    assert_eq!(
        result,
        Err(RouteError::DeviceUnavailable { device: AudioDevice::Earpiece }),
        "nothing is available before start"
    );

    handle.start().await.unwrap();

    let result = handle.select_audio_device(AudioDevice::Bluetooth).await;
    assert!(matches!(result, Err(RouteError::DeviceUnavailable { .. })));

    let result = handle.set_default_audio_device(AudioDevice::WiredHeadset).await;
    assert!(matches!(result, Err(RouteError::UnsupportedDevice { .. })));

    assert_eq!(
        handle.set_default_audio_device(AudioDevice::Earpiece).await,
        Ok(AudioDevice::Earpiece)
    );
    assert_eq!(handle.selected_audio_device().await.unwrap(), AudioDevice::Earpiece);

    handle.toggle_audio_device(AudioDevice::SpeakerPhone).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.selected, AudioDevice::SpeakerPhone);
    assert_eq!(snapshot.user_selected, AudioDevice::SpeakerPhone);
    assert_eq!(snapshot.default_device, AudioDevice::SpeakerPhone);

    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_preference_change_reevaluates() {
    let fixture = spawn(RouteConfig::default().with_speakerphone(SpeakerphonePreference::On));
    let handle = fixture.manager.handle();
    handle.start().await.unwrap();

    fixture.proximity.set_near(true);
    assert_eq!(handle.selected_audio_device().await.unwrap(), AudioDevice::SpeakerPhone);

    handle.set_speakerphone_preference(SpeakerphonePreference::Auto).unwrap();
    assert_eq!(handle.selected_audio_device().await.unwrap(), AudioDevice::Earpiece);

    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_preference_change_waits_for_queued_events() {
    let fixture = spawn(RouteConfig::default());
    let handle = fixture.manager.handle();

    let seen: Arc<Mutex<Vec<AudioDevice>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    handle
        .start_with_observer(move |selected: AudioDevice, _available: &DeviceSet| {
            sink.lock().push(selected);
        })
        .await
        .unwrap();

    // The reading is queued while the preference is still auto
    handle.notify_proximity_changed(true).unwrap();
    handle.set_speakerphone_preference(SpeakerphonePreference::On).unwrap();
    assert_eq!(handle.selected_audio_device().await.unwrap(), AudioDevice::SpeakerPhone);

    assert_eq!(
        *seen.lock(),
        vec![AudioDevice::SpeakerPhone, AudioDevice::Earpiece, AudioDevice::SpeakerPhone],
        "proximity reading must be judged under the preference in force when it arrived"
    );
    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_custom_observer() {
    let fixture = spawn(RouteConfig::default());
    let handle = fixture.manager.handle();

    let seen: Arc<Mutex<Vec<AudioDevice>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    handle
        .start_with_observer(move |selected: AudioDevice, _available: &DeviceSet| {
            sink.lock().push(selected);
        })
        .await
        .unwrap();

    fixture.platform.plug_headset(true);
    handle.snapshot().await.unwrap();

    assert_eq!(*seen.lock(), vec![AudioDevice::SpeakerPhone, AudioDevice::WiredHeadset]);
    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_concurrent_handles_serialize() {
    let fixture = spawn(RouteConfig::default());
    let handle = fixture.manager.handle();
    handle.start().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let device = if i % 2 == 0 {
                AudioDevice::Earpiece
            } else {
                AudioDevice::SpeakerPhone
            };
            handle.toggle_audio_device(device).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.available.contains(snapshot.selected));
    assert_eq!(snapshot.selected, snapshot.default_device);

    fixture.manager.shutdown();
}

#[tokio::test]
async fn test_shutdown_releases_session() {
    let fixture = spawn(RouteConfig::default().with_thread_name("route-test"));
    let handle = fixture.manager.handle();
    handle.start().await.unwrap();
    assert!(fixture.platform.inspect().focus_held);

    fixture.manager.shutdown();

    assert!(fixture.bluetooth.inspect().released);
    assert!(!fixture.platform.inspect().focus_held);
    assert!(!fixture.proximity.inspect().running);
    assert_eq!(handle.snapshot().await, Err(RouteError::ChannelClosed));
    assert_eq!(handle.notify_proximity_changed(true), Err(RouteError::ChannelClosed));
}

#[tokio::test]
async fn test_dropping_manager_stops_thread() {
    let fixture = spawn(RouteConfig::default());
    let handle = fixture.manager.handle();
    handle.start().await.unwrap();

    drop(fixture.manager);

    assert_eq!(handle.stop().await, Err(RouteError::ChannelClosed));
}

#[test]
fn test_invalid_config_rejected() {
    let ports = RoutePorts::new(MockAudioPlatform::new(), MockBluetooth::new(), MockProximity::new());
    let result = RouteManager::spawn(ports, RouteConfig::default().with_event_channel_capacity(0));
    assert!(matches!(result, Err(RouteError::Configuration { .. })));
}
