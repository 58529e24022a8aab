#![no_main]

use hatchery::args::RoleCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(applied) = hatchery::fuzzing::apply_config_from_toml(input) {
            debug_assert_eq!(applied.len(), 3);
            for args in applied {
                match args.command {
                    RoleCommand::Local(local) => {
                        debug_assert!(!local.load.print_interval.is_zero());
                    }
                    RoleCommand::Coordinator(coordinator) => {
                        debug_assert!(coordinator.expect_workers.get() >= 1);
                        debug_assert!(!coordinator.heartbeat_timeout.is_zero());
                    }
                    RoleCommand::Worker(worker) => {
                        debug_assert!(!worker.report_interval.is_zero());
                    }
                }
            }
        }
    }
});
