use cartwise_db::{GroceryDemoDataset, SeedResult};

use crate::commands::{build_runtime, load_config, open_database, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = GroceryDemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = GroceryDemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if verification.all_present {
            Ok(seeded)
        } else {
            Err::<SeedResult, StepFailure>((
                "seed_verification",
                verification_failure_message(&verification.checks),
                6u8,
            ))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "grocery demo dataset loaded: {} products, {} orders ({} settled)",
                seeded.products_seeded, seeded.orders_seeded, seeded.settled_orders
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("catalog-count", true), ("catalog-products", false), ("order-lines", false)];

        assert_eq!(
            verification_failure_message(&checks),
            "Seed verification failed for checks: catalog-products, order-lines"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("catalog-count", true), ("settled-history", true)];

        assert_eq!(verification_failure_message(&checks), "Some seed data failed to load");
    }
}
