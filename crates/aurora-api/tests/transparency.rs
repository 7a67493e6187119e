//! One command sequence through all four strategies, each over a fresh in-memory
//! delegate: results must be identical.

use aurora_api::config::{build_executor, GatewayConfig, StrategyKind};
use aurora_delegate::DelegateConfig;
use aurora_executor::JobExecutor;
use aurora_types::{CommandResult, JobCommand, JobKey, JobSpec, Payload};
use std::path::Path;

fn commands() -> Vec<JobCommand> {
    let key = JobKey::full("c1", "roleA", "prod", "web");
    let list = JobCommand::ListJobs {
        key: JobKey::role("c1", "roleA"),
    };
    let create = JobCommand::CreateJob {
        key: key.clone(),
        spec: JobSpec::from("jobs = [Job(name='web')]"),
    };
    let delete = JobCommand::DeleteJob {
        key: key.clone(),
        spec: None,
        instances: Default::default(),
    };
    vec![
        list.clone(),
        create.clone(),
        create,
        JobCommand::UpdateJob {
            key: key.clone(),
            spec: JobSpec::from("jobs = [Job(name='web', instances=2)]"),
            instances: ["0", "1"].into_iter().collect(),
        },
        JobCommand::CancelUpdate {
            key: key.clone(),
            spec: None,
        },
        JobCommand::RestartJob {
            key,
            spec: None,
            instances: Default::default(),
        },
        list,
        delete.clone(),
        delete,
    ]
}

async fn run(strategy: StrategyKind) -> Vec<CommandResult> {
    let config = GatewayConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        prefix: String::new(),
        delegate: DelegateConfig::Memory,
        strategy,
        parallel: 1,
    };
    let executor =
        build_executor(&config, Path::new(env!("CARGO_BIN_EXE_aurora-rest"))).unwrap();
    let mut results = Vec::new();
    for command in commands() {
        results.push(executor.dispatch(command).resolve().await);
    }
    executor.close();
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_strategy_gives_the_same_results() {
    let expected = run(StrategyKind::Sync).await;
    for strategy in [
        StrategyKind::Callback,
        StrategyKind::Thread,
        StrategyKind::Process,
    ] {
        assert_eq!(run(strategy).await, expected, "{}", strategy.as_str());
    }

    let web = "c1/roleA/prod/web".to_string();
    assert_eq!(expected[0].payload, Payload::Jobs(Vec::new()));
    assert!(expected[1].is_success());
    assert!(!expected[2].is_success());
    assert!(expected[3..6].iter().all(CommandResult::is_success));
    assert_eq!(expected[6].payload, Payload::Jobs(vec![web.clone()]));
    assert_eq!(expected[7].payload, Payload::Deleted(vec![web]));
    assert_eq!(expected[8].payload, Payload::Deleted(Vec::new()));
    assert_eq!(expected[8].errors, None);
}
