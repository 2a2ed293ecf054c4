use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;

#[test]
fn test_add_reserves_consecutive_regions() {
    let mut instances = InstancesBuffer::new();
    instances.clear();
    assert_eq!(instances.add(15), 0);
    assert_eq!(instances.add(30), 15);
    assert_eq!(instances.visit_len(), 45);

    // A second visit starts where the first ended
    instances.clear();
    assert_eq!(instances.visit_len(), 0);
    assert_eq!(instances.add(10), 45);
    assert_eq!(instances.frame_len(), 55);
}

#[test]
fn test_begin_frame_rewinds() {
    let mut instances = InstancesBuffer::new();
    instances.add(100);
    instances.begin_frame();
    assert_eq!(instances.frame_len(), 0);
    assert_eq!(instances.add(1), 0);
}

#[test]
fn test_region_mut_writes_vectors() {
    let mut device = MockGraphicsDevice::new();
    let mut instances = InstancesBuffer::new();
    instances.clear();
    let offset = instances.add(2);

    let mut lock = instances.lock();
    let region = lock.region_mut(offset, 2);
    region[0] = Vec4::ONE;
    region[1] = Vec4::splat(2.0);
    lock.unlock(&mut device).unwrap();

    assert_eq!(instances.vectors[0], Vec4::ONE);
    assert_eq!(instances.vectors[1], Vec4::splat(2.0));
}

#[test]
fn test_empty_visit_creates_no_buffer() {
    let mut device = MockGraphicsDevice::new();
    let mut instances = InstancesBuffer::new();
    instances.clear();
    instances.lock().unlock(&mut device).unwrap();

    assert!(instances.buffer().is_none());
    assert!(device.get_created_buffers().is_empty());
}

#[test]
fn test_gpu_buffer_grows_only_when_needed() {
    let mut device = MockGraphicsDevice::new();
    let mut instances = InstancesBuffer::new();

    instances.clear();
    instances.add(100);
    instances.lock().unlock(&mut device).unwrap();
    assert_eq!(instances.gpu_capacity(), 1024);
    assert_eq!(device.get_created_buffers().len(), 1);

    // Fits in the existing allocation
    instances.clear();
    instances.add(500);
    instances.lock().unlock(&mut device).unwrap();
    assert_eq!(device.get_created_buffers().len(), 1);

    // 600 + 500 exceeds 1024
    instances.clear();
    instances.add(500);
    instances.lock().unlock(&mut device).unwrap();
    assert_eq!(device.get_created_buffers().len(), 2);
    assert_eq!(instances.gpu_capacity(), 2048);
    assert_eq!(instances.buffer().unwrap().size(), 2048 * 16);
}
