use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

use devguard::backend::fake::{FakeBackend, FakeCuda, FakeHip};
use devguard::{Device, DeviceGuard, DeviceType, DynBackend, DynDeviceGuard, MaybeDeviceGuard};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Cuda = FakeBackend<FakeCuda>;

fn nested(cuda: &Cuda) -> Result<(), Box<dyn Error>> {
    info!(index = cuda.index(), "before outer guard");
    let mut outer = DeviceGuard::new(cuda.clone(), 1)?;
    info!(index = cuda.index(), original = %outer.original_device(), "outer guard on cuda:1");
    {
        let inner = DeviceGuard::new(cuda.clone(), 2)?;
        info!(index = cuda.index(), original = %inner.original_device(), "inner guard on cuda:2");
    }
    info!(index = cuda.index(), "inner guard dropped");

    outer.set_index(3)?;
    info!(index = cuda.index(), current = %outer.current_device(), "outer guard switched");

    if let Err(err) = outer.set_device(Device::new(DeviceType::Hip, 0)) {
        info!(%err, "outer guard refused a hip device");
    }
    drop(outer);
    info!(index = cuda.index(), "outer guard dropped");
    Ok(())
}

fn deferred(cuda: &Cuda, needs_device: bool) -> Result<(), Box<dyn Error>> {
    let mut guard = MaybeDeviceGuard::new(cuda.clone());
    if needs_device {
        guard.set_index(2)?;
    }
    info!(
        index = cuda.index(),
        populated = guard.is_populated(),
        writes = cuda.writes(),
        "optional guard"
    );

    guard.reset().map_err(|(_, err)| err)?;
    info!(index = cuda.index(), "optional guard reset");
    Ok(())
}

fn unwinding(cuda: &Cuda) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _guard = DeviceGuard::new(cuda.clone(), 5);
        panic!("kernel launch failed");
    }));
    info!(panicked = result.is_err(), index = cuda.index(), "guarded scope unwound");
}

fn dynamic(cuda: &Cuda, hip: &FakeBackend<FakeHip>, name: &str) -> Result<(), Box<dyn Error>> {
    let device: Device = name.parse()?;
    let backend: &dyn DynBackend = match device.device_type() {
        DeviceType::Hip => hip,
        _ => cuda,
    };

    let guard = DynDeviceGuard::with_device(backend, device).map_err(|err| err.to_string())?;
    info!(%device, current = %guard.current_device(), "dynamic guard");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cuda = Cuda::with_index(0);
    let hip = FakeBackend::<FakeHip>::with_index(0);

    nested(&cuda)?;
    deferred(&cuda, false)?;
    deferred(&cuda, true)?;
    unwinding(&cuda);
    dynamic(&cuda, &hip, "hip:1")?;
    dynamic(&cuda, &hip, "cuda:2")?;

    info!(cuda = cuda.index(), hip = hip.index(), "done");
    Ok(())
}
