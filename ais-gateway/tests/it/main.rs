use ais_gateway::settings::Settings;

mod gateway;
mod helper;

#[test]
fn default_settings_file_is_valid() {
    let settings = Settings::new().unwrap();
    assert_eq!(settings.broadcast.tcp_port, 39150);
    assert!(settings.update_interval.as_secs() > 0);
    assert!(settings.resend_interval >= settings.update_interval);
}
