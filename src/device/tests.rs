use super::*;
use crate::config::Family;
use crate::testing::{init_logging, MockDevice, NoDelay, REVISION, SERIAL};
use core::convert::TryFrom;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::SigningKey;
use signature::rand_core::RngCore;

fn open(mock: &mut MockDevice, config: InterfaceConfig) -> Device<&mut MockDevice, NoDelay> {
    init_logging();
    let mut device = Device::new(mock, NoDelay);
    device.open(config).unwrap();
    device
}

fn digest(byte: u8) -> Digest {
    Digest::try_from([byte; 32].as_ref()).unwrap()
}

fn software_key() -> SigningKey {
    SigningKey::from_slice(&[0x11; 32]).unwrap()
}

fn raw_public_key(key: &SigningKey) -> PublicKey {
    let point = key.verifying_key().to_encoded_point(false);
    PublicKey::try_from(&point.as_bytes()[1..]).unwrap()
}

fn software_signature(key: &SigningKey, digest: &Digest) -> Signature {
    let signature: p256::ecdsa::Signature = key.sign_prehash(digest.as_ref()).unwrap();
    Signature::from(signature)
}

#[test]
fn closed_handle_is_not_initialized() {
    let mut mock = MockDevice::atecc608a();
    let mut device = Device::new(&mut mock, NoDelay);
    assert!(!device.is_open());
    assert_eq!(device.device_type(), DeviceType::Unknown);
    assert_eq!(device.random().unwrap_err().kind(), ErrorKind::NotInitialized);
    assert_eq!(device.wake().unwrap_err().kind(), ErrorKind::NotInitialized);
}

#[test]
fn unknown_device_type_opens_without_binding() {
    let mut mock = MockDevice::atecc608a();
    let config = InterfaceConfig::atecc608a().with_device_type(DeviceType::Unknown);
    let mut device = open(&mut mock, config);
    assert!(device.is_open());
    assert_eq!(device.device_type(), DeviceType::Unknown);
    assert_eq!(device.info().unwrap_err().kind(), ErrorKind::NotInitialized);
    assert_eq!(device.sha(b"abc").unwrap_err().kind(), ErrorKind::NotInitialized);
    assert!(!device.supports(Operation::Random));
    drop(device);
    assert!(mock.commands.is_empty());
}

#[test]
fn released_handle_is_not_initialized() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    device.release().unwrap();
    device.release().unwrap();
    assert_eq!(device.info().unwrap_err().kind(), ErrorKind::NotInitialized);
}

#[test]
fn non_i2c_interface_is_rejected() {
    let mut mock = MockDevice::atecc608a();
    let mut device = Device::new(&mut mock, NoDelay);
    let config = InterfaceConfig::atecc608a().with_iface_type(IfaceType::Swi);
    assert_eq!(device.open(config).unwrap_err().kind(), ErrorKind::BadParam);
    assert!(!device.is_open());
}

#[test]
fn malformed_config_closes_existing_session() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let broken = InterfaceConfig::atecc608a().with_baud(0);
    assert_eq!(device.open(broken).unwrap_err().kind(), ErrorKind::BadParam);
    assert!(!device.is_open());
    assert_eq!(device.device_type(), DeviceType::Unknown);
    assert_eq!(device.info().unwrap_err().kind(), ErrorKind::NotInitialized);
}

#[test]
fn open_reads_chip_mode_of_608a() {
    let mut mock = MockDevice::atecc608a();
    let device = open(&mut mock, InterfaceConfig::atecc608a());
    drop(device);
    assert_eq!(mock.commands, [0x02]);
}

#[test]
fn open_of_508a_sends_nothing() {
    let mut mock = MockDevice::atecc608a();
    let config = InterfaceConfig::i2c(DeviceType::Atecc508a, 0xC0);
    let device = open(&mut mock, config);
    drop(device);
    assert!(mock.commands.is_empty());
}

#[test]
fn failed_calibration_leaves_handle_closed() {
    let mut mock = MockDevice::atecc608a();
    mock.unresponsive = true;
    let mut device = Device::new(&mut mock, NoDelay);
    assert!(device.open(InterfaceConfig::atecc608a()).is_err());
    assert!(!device.is_open());
}

#[test]
fn failed_exchange_still_idles_the_part() {
    let mut mock = MockDevice::atecc608a();
    mock.mute = true;
    let config = InterfaceConfig::i2c(DeviceType::Atecc508a, 0xC0);
    let mut device = open(&mut mock, config);
    assert_eq!(device.random().unwrap_err().kind(), ErrorKind::Timeout);
    drop(device);
    assert_eq!(mock.commands, [0x1B]);
    assert!(!mock.is_awake());
}

#[test]
fn ca_info_and_serial() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    assert_eq!(device.info().unwrap().as_ref(), REVISION);
    assert_eq!(device.read_serial_number().unwrap().as_ref(), SERIAL);
}

#[test]
fn ta_info_and_serial() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    assert_eq!(device.info().unwrap().as_ref(), REVISION);
    assert_eq!(device.read_serial_number().unwrap().as_ref(), SERIAL);
}

#[test]
fn ca_wake_idle_sleep() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    device.wake().unwrap();
    device.idle().unwrap();
    device.wake().unwrap();
    device.sleep().unwrap();
}

#[test]
fn ta_power_states_are_silent() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    device.wake().unwrap();
    device.idle().unwrap();
    device.sleep().unwrap();
    drop(device);
    assert!(mock.commands.is_empty());
}

#[test]
fn ta_reports_unimplemented_operations() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    let kind = |result: Result<(), Error>| result.unwrap_err().kind();
    assert_eq!(kind(device.nonce(&digest(0x01))), ErrorKind::Unimplemented);
    assert_eq!(
        kind(device.counter_read(0).map(drop)),
        ErrorKind::Unimplemented
    );
    assert_eq!(
        kind(device.counter_increment(0).map(drop)),
        ErrorKind::Unimplemented
    );
    assert_eq!(
        kind(device.derive_key(0, Slot::PrivateKey01, None)),
        ErrorKind::Unimplemented
    );
    assert_eq!(kind(device.selftest(0x01, 0)), ErrorKind::Unimplemented);
    let mut word = [0u8; 4];
    assert_eq!(
        kind(device.read_zone(Zone::Config, Slot::PrivateKey00, 0, 0, &mut word)),
        ErrorKind::Unimplemented
    );
    assert!(!device.supports(Operation::PrivWrite));
    drop(device);
    assert!(mock.commands.is_empty());
}

#[test]
fn sha204a_has_no_ecc() {
    let mut mock = MockDevice::atecc608a();
    let config = InterfaceConfig::i2c(DeviceType::Atsha204a, 0xC0);
    let mut device = open(&mut mock, config);
    assert_eq!(
        device.sign(Slot::PrivateKey00, &digest(0x01)).unwrap_err().kind(),
        ErrorKind::Unimplemented
    );
    assert_eq!(device.random().unwrap().as_ref().len(), 32);
}

#[test]
fn random_blocks_differ() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let first = device.random().unwrap();
    let second = device.random().unwrap();
    assert_ne!(first, second);
}

#[test]
fn rng_adapter_fills_odd_lengths() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    let mut bytes = [0u8; 45];
    device.rng().fill_bytes(&mut bytes);
    assert!(bytes.iter().any(|b| *b != 0));
    drop(device);
    assert_eq!(mock.commands, [0x06, 0x06]);
}

#[test]
fn rng_adapter_reports_failure() {
    let mut mock = MockDevice::atecc608a();
    let config = InterfaceConfig::i2c(DeviceType::Atecc508a, 0xC0);
    let mut device = open(&mut mock, config);
    device.release().unwrap();
    let mut bytes = [0u8; 8];
    let e = device.rng().try_fill_bytes(&mut bytes).unwrap_err();
    assert_eq!(e.code().map(|code| code.get()), Some(ErrorKind::NotInitialized as u32));
}

fn sign_and_verify(mock: &mut MockDevice, config: InterfaceConfig) {
    let mut device = open(mock, config);
    let public_key = device.genkey(Slot::PrivateKey01).unwrap();
    assert_eq!(device.get_pubkey(Slot::PrivateKey01).unwrap(), public_key);

    let message = digest(0x42);
    let signature = device.sign(Slot::PrivateKey01, &message).unwrap();
    assert!(device.verify_extern(&message, &signature, &public_key).unwrap());
    assert!(!device.verify_extern(&digest(0x43), &signature, &public_key).unwrap());
}

#[test]
fn ca_sign_and_verify() {
    sign_and_verify(&mut MockDevice::atecc608a(), InterfaceConfig::atecc608a());
}

#[test]
fn ta_sign_and_verify() {
    sign_and_verify(&mut MockDevice::ta100(), InterfaceConfig::ta100());
}

#[test]
fn ca_signature_checks_in_software() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let public_key = device.genkey(Slot::PrivateKey02).unwrap();
    let message = digest(0x07);
    let signature = device.sign(Slot::PrivateKey02, &message).unwrap();

    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    let mut sec1 = [0x04u8; 65];
    sec1[1..].copy_from_slice(public_key.as_ref());
    let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).unwrap();
    let signature = p256::ecdsa::Signature::try_from(signature).unwrap();
    key.verify_prehash(message.as_ref(), &signature).unwrap();
}

#[test]
fn verify_with_invalid_key_is_an_execution_error() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let key = software_key();
    let message = digest(0x01);
    let signature = software_signature(&key, &message);
    let not_on_curve = PublicKey::try_from([0x01; 64].as_ref()).unwrap();
    let e = device
        .verify_extern(&message, &signature, &not_on_curve)
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ExecutionError);
    assert_eq!(e.device_status(), Some(crate::error::Status::Execution));
}

#[test]
fn verify_stored_public_key() {
    for (mut mock, config) in [
        (MockDevice::atecc608a(), InterfaceConfig::atecc608a()),
        (MockDevice::ta100(), InterfaceConfig::ta100()),
    ] {
        let mut device = open(&mut mock, config);
        let key = software_key();
        let public_key = raw_public_key(&key);
        device
            .write_pubkey(Slot::Certificate0a, &public_key)
            .unwrap();
        assert_eq!(device.read_pubkey(Slot::Certificate0a).unwrap(), public_key);

        let message = digest(0x5A);
        let signature = software_signature(&key, &message);
        assert!(device
            .verify_stored(&message, &signature, Slot::Certificate0a)
            .unwrap());
        assert!(!device
            .verify_stored(&digest(0x5B), &signature, Slot::Certificate0a)
            .unwrap());
    }
}

#[test]
fn ca_public_key_slot_layout() {
    let mut mock = MockDevice::atecc608a();
    let public_key = raw_public_key(&software_key());
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    device.write_pubkey(Slot::Certificate09, &public_key).unwrap();
    drop(device);
    let stored = &mock.slots[9];
    assert_eq!(stored[0..4], [0u8; 4]);
    assert_eq!(stored[4..36], public_key.as_ref()[..32]);
    assert_eq!(stored[36..40], [0u8; 4]);
    assert_eq!(stored[40..72], public_key.as_ref()[32..]);
}

#[test]
fn public_key_in_private_slot_is_rejected() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let public_key = raw_public_key(&software_key());
    assert_eq!(
        device
            .write_pubkey(Slot::PrivateKey03, &public_key)
            .unwrap_err()
            .kind(),
        ErrorKind::BadParam
    );
}

#[test]
fn counters_increment_monotonically() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    assert_eq!(device.counter_read(1).unwrap(), 0);
    assert_eq!(device.counter_increment(1).unwrap(), 1);
    assert_eq!(device.counter_increment(1).unwrap(), 2);
    assert_eq!(device.counter_read(1).unwrap(), 2);
    assert_eq!(device.counter_read(0).unwrap(), 0);
    assert_eq!(device.counter_read(2).unwrap_err().kind(), ErrorKind::BadParam);
}

#[test]
fn config_zone_and_locks() {
    for (mut mock, config) in [
        (MockDevice::atecc608a(), InterfaceConfig::atecc608a()),
        (MockDevice::ta100(), InterfaceConfig::ta100()),
    ] {
        let mut device = open(&mut mock, config);
        let zone = device.read_config_zone().unwrap();
        assert_eq!(zone[0..4], SERIAL[0..4]);
        assert_eq!(zone[86..88], [0x55, 0x55]);

        assert!(!device.is_locked(Zone::Config).unwrap());
        device.lock_config_zone().unwrap();
        assert!(device.is_locked(Zone::Config).unwrap());

        assert!(!device.is_locked(Zone::Data).unwrap());
        device.lock_data_zone().unwrap();
        assert!(device.is_locked(Zone::Data).unwrap());

        assert!(!device.is_slot_locked(Slot::Certificate0c).unwrap());
        device.lock_data_slot(Slot::Certificate0c).unwrap();
        assert!(device.is_slot_locked(Slot::Certificate0c).unwrap());
        assert!(!device.is_slot_locked(Slot::Certificate0d).unwrap());
    }
}

#[test]
fn ca_otp_lock_state_is_a_bad_param() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    assert_eq!(device.is_locked(Zone::Otp).unwrap_err().kind(), ErrorKind::BadParam);
}

#[test]
fn read_bytes_across_blocks() {
    for (family, config) in [
        (Family::Ca, InterfaceConfig::atecc608a()),
        (Family::Ta, InterfaceConfig::ta100()),
    ] {
        let mut mock = match family {
            Family::Ca => MockDevice::atecc608a(),
            Family::Ta => MockDevice::ta100(),
        };
        let contents: std::vec::Vec<u8> = (0..=255u8).chain(0..160).collect();
        mock.set_slot(8, &contents);
        let mut device = open(&mut mock, config);
        let mut data = [0u8; 100];
        device
            .read_bytes_zone(Zone::Data, Slot::Data08, 30, &mut data)
            .unwrap();
        assert_eq!(data[..], contents[30..130]);
    }
}

#[test]
fn write_then_read_zone() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let word = [0xDE, 0xAD, 0xBE, 0xEF];
    device
        .write_zone(Zone::Data, Slot::Data08, 2, 3, &word)
        .unwrap();
    let mut read = [0u8; 4];
    device
        .read_zone(Zone::Data, Slot::Data08, 2, 3, &mut read)
        .unwrap();
    assert_eq!(read, word);
    drop(device);
    assert_eq!(mock.slots[8][76..80], word);
}

#[test]
fn ta_write_zone_lands_at_byte_position() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    let block = [0xA5; 32];
    device
        .write_zone(Zone::Data, Slot::Data08, 1, 0, &block)
        .unwrap();
    drop(device);
    assert_eq!(mock.slots[8][32..64], block);
}

#[test]
fn device_sha_matches_software() {
    use sha2::{Digest as _, Sha256};
    let message: std::vec::Vec<u8> = (0..150u8).collect();
    for (mut mock, config) in [
        (MockDevice::atecc608a(), InterfaceConfig::atecc608a()),
        (MockDevice::ta100(), InterfaceConfig::ta100()),
    ] {
        let mut device = open(&mut mock, config);
        let digest = device.sha(&message).unwrap();
        assert_eq!(digest.as_ref(), Sha256::digest(&message).as_slice());
        assert_eq!(device.sha_update(&[0u8; 10]).unwrap_err().kind(), ErrorKind::BadParam);
    }
}

#[test]
fn aes_roundtrip_through_device() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    let plaintext = [0x10; AES_BLOCK_SIZE];
    let ciphertext = device.aes_encrypt(Slot::Data08, &plaintext).unwrap();
    assert_ne!(ciphertext, plaintext);
    assert_eq!(device.aes_decrypt(Slot::Data08, &ciphertext).unwrap(), plaintext);
}

#[test]
fn aes_is_absent_on_508a() {
    let mut mock = MockDevice::atecc608a();
    let config = InterfaceConfig::i2c(DeviceType::Atecc508a, 0xC0);
    let mut device = open(&mut mock, config);
    let block = [0u8; AES_BLOCK_SIZE];
    assert_eq!(
        device.aes_encrypt(Slot::Data08, &block).unwrap_err().kind(),
        ErrorKind::Unimplemented
    );
}

#[test]
fn ecdh_returns_shared_secret() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let peer = raw_public_key(&software_key());
    let secret = device.ecdh(Slot::PrivateKey00, &peer).unwrap();
    assert_eq!(secret.as_ref().len(), 32);
}

#[test]
fn private_key_import_signs() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    let key = software_key();
    let private_key = Block::try_from(key.to_bytes().as_slice()).unwrap();
    device.priv_write(Slot::PrivateKey04, &private_key).unwrap();
    assert_eq!(device.get_pubkey(Slot::PrivateKey04).unwrap(), raw_public_key(&key));
    assert_eq!(
        device.priv_write(Slot::Data08, &private_key).unwrap_err().kind(),
        ErrorKind::BadParam
    );
}

#[test]
fn nonce_selftest_and_derive_key() {
    let mut mock = MockDevice::atecc608a();
    let mut device = open(&mut mock, InterfaceConfig::atecc608a());
    device.nonce(&digest(0x33)).unwrap();
    device.selftest(0x01, 0).unwrap();
    device.derive_key(0x04, Slot::Data08, None).unwrap();
    device
        .derive_key(0x04, Slot::Data08, Some(&digest(0x01)))
        .unwrap();
}

#[test]
fn unresponsive_family_b_times_out() {
    let mut mock = MockDevice::ta100();
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    drop(device);
    mock.unresponsive = true;
    let mut device = open(&mut mock, InterfaceConfig::ta100());
    assert_eq!(device.random().unwrap_err().kind(), ErrorKind::Timeout);
}

#[test]
fn free_returns_the_bus() {
    let mut mock = MockDevice::ta100();
    let device = open(&mut mock, InterfaceConfig::ta100());
    let (phy, _delay) = device.free();
    assert!(phy.commands.is_empty());
}
