//! Flat action encoding tests

use signal_control::control::{decode, encode, ActionCodec, EnvError};

#[test]
fn test_uniform_codec_is_base_n() {
    assert_eq!(encode(&[0, 0, 0], 4).unwrap(), 0);
    assert_eq!(encode(&[0, 0, 3], 4).unwrap(), 3);
    assert_eq!(encode(&[0, 1, 0], 4).unwrap(), 4);
    assert_eq!(encode(&[2, 3, 1], 4).unwrap(), 2 * 16 + 3 * 4 + 1);
    assert_eq!(decode(45, 4, 3).unwrap(), vec![2, 3, 1]);
}

/// The first intersection is the most significant digit
#[test]
fn test_first_intersection_is_most_significant() {
    let codec = ActionCodec::uniform(4, 2).unwrap();
    assert_eq!(codec.decode(1).unwrap(), vec![0, 1]);
    assert_eq!(codec.decode(4).unwrap(), vec![1, 0]);
}

#[test]
fn test_decode_inverts_encode_for_every_action() {
    let codec = ActionCodec::new(vec![4, 2, 3]).unwrap();
    assert_eq!(codec.cardinality(), Some(24));
    for flat in 0..24 {
        let phases = codec.decode(flat).unwrap();
        assert_eq!(codec.encode(&phases).unwrap(), flat);
    }
}

#[test]
fn test_mixed_radix_digits() {
    let codec = ActionCodec::new(vec![3, 2]).unwrap();
    assert_eq!(codec.encode(&[2, 1]).unwrap(), 5);
    assert_eq!(codec.decode(3).unwrap(), vec![1, 1]);
}

#[test]
fn test_out_of_range_flat_action_rejected() {
    let codec = ActionCodec::uniform(4, 2).unwrap();
    assert!(matches!(codec.decode(16), Err(EnvError::InvalidAction(_))));
    assert!(codec.decode(15).is_ok());
}

#[test]
fn test_out_of_range_phase_rejected() {
    let codec = ActionCodec::new(vec![4, 2]).unwrap();
    assert!(matches!(
        codec.encode(&[1, 2]),
        Err(EnvError::InvalidAction(_))
    ));
    assert!(matches!(codec.encode(&[1]), Err(EnvError::InvalidAction(_))));
    assert!(matches!(
        codec.validate(&[0, 0, 0]),
        Err(EnvError::InvalidAction(_))
    ));
}

#[test]
fn test_zero_radix_rejected() {
    assert!(matches!(
        ActionCodec::new(vec![4, 0]),
        Err(EnvError::InvalidAction(_))
    ));
}

/// An overflowing flat space still validates phase vectors but cannot encode
#[test]
fn test_overflowing_flat_space() {
    let codec = ActionCodec::uniform(4, 36).unwrap();
    assert_eq!(codec.cardinality(), None);
    assert!(codec.validate(&[3; 36]).is_ok());
    assert!(matches!(
        codec.validate(&[4; 36]),
        Err(EnvError::InvalidAction(_))
    ));
    assert!(matches!(
        codec.flat_cardinality(),
        Err(EnvError::InvalidAction(_))
    ));
    assert!(matches!(codec.encode(&[0; 36]), Err(EnvError::InvalidAction(_))));
    assert!(matches!(codec.decode(0), Err(EnvError::InvalidAction(_))));
}

#[test]
fn test_empty_codec_has_single_action() {
    let codec = ActionCodec::new(Vec::new()).unwrap();
    assert_eq!(codec.cardinality(), Some(1));
    assert_eq!(codec.decode(0).unwrap(), Vec::<usize>::new());
}
