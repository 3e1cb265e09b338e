#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const ACCOUNT: &str = "111122223333";

const FAKE_AWS: &str = r#"#!/usr/bin/env bash
set -euo pipefail

while [[ $# -gt 0 ]]; do
  case "$1" in
    --profile|--region|--output) shift 2 ;;
    *) break ;;
  esac
done

service="$1"
op="$2"
shift 2
printf '%s %s %s\n' "$service" "$op" "$*" >> "${FAKE_AWS_LOG}"
state="${FAKE_AWS_STATE}"

arg() {
  local name="$1"
  shift
  while [[ $# -gt 0 ]]; do
    if [[ "$1" == "$name" ]]; then
      printf '%s' "$2"
      return
    fi
    shift
  done
}

fail() {
  echo "An error occurred ($1) when calling the $op operation: $2" >&2
  exit 254
}

arn_base="arn:aws:quicksight:us-east-1:111122223333"

case "$service $op" in
  "sts get-caller-identity")
    if [[ -n "${FAKE_AWS_NO_IDENTITY:-}" ]]; then
      echo "Unable to locate credentials. You can configure credentials by running \"aws configure\"." >&2
      exit 253
    fi
    echo '{"UserId":"AIDAEXAMPLE","Account":"111122223333","Arn":"arn:aws:iam::111122223333:user/backup-bot"}'
    ;;
  "quicksight list-analyses")
    cat "$state/analyses.json"
    ;;
  "quicksight describe-analysis")
    id="$(arg --analysis-id "$@")"
    echo "{\"Analysis\":{\"AnalysisId\":\"$id\",\"Arn\":\"$arn_base:analysis/$id\",\"Name\":\"$id\",\"DataSetArns\":[\"$arn_base:dataset/$id-ds\"]}}"
    ;;
  "quicksight describe-template")
    id="$(arg --template-id "$@")"
    if [[ ! -f "$state/template-$id" ]]; then
      fail ResourceNotFoundException "template $id not found"
    fi
    echo "{\"Template\":{\"Arn\":\"$arn_base:template/$id\",\"TemplateId\":\"$id\",\"Version\":{\"Status\":\"CREATION_SUCCESSFUL\"}}}"
    ;;
  "quicksight create-template")
    id="$(arg --template-id "$@")"
    touch "$state/template-$id"
    echo "{\"Arn\":\"$arn_base:template/$id\",\"CreationStatus\":\"CREATION_IN_PROGRESS\"}"
    ;;
  "quicksight create-analysis")
    id="$(arg --analysis-id "$@")"
    if [[ "$id" == "${FAKE_AWS_FAIL_ANALYSIS:-}" ]]; then
      fail InternalFailureException "internal failure"
    fi
    if [[ -f "$state/analysis-$id" ]]; then
      fail ResourceExistsException "analysis $id exists"
    fi
    touch "$state/analysis-$id"
    echo "{\"Arn\":\"$arn_base:analysis/$id\",\"CreationStatus\":\"CREATION_IN_PROGRESS\"}"
    ;;
  "quicksight create-folder-membership")
    id="$(arg --member-id "$@")"
    if [[ "$id" == "${FAKE_AWS_FAIL_MEMBERSHIP:-}" ]]; then
      fail AccessDeniedException "not allowed to file $id"
    fi
    if [[ -f "$state/member-$id" ]]; then
      fail ResourceExistsException "member $id exists"
    fi
    touch "$state/member-$id"
    echo '{"Status":200}'
    ;;
  "quicksight list-folder-members")
    if [[ ! -f "$state/members.json" ]]; then
      fail ResourceNotFoundException "folder not found"
    fi
    cat "$state/members.json"
    ;;
  "quicksight delete-analysis")
    echo '{"Status":200}'
    ;;
  *)
    echo "fake aws: unexpected $service $op" >&2
    exit 2
    ;;
esac
"#;

pub struct FakeAws {
    pub bin: PathBuf,
    pub log: PathBuf,
    pub state: PathBuf,
    pub home: PathBuf,
}

impl FakeAws {
    pub fn install(root: &Path) -> Self {
        let bin = root.join("aws");
        let log = root.join("aws-calls.log");
        let state = root.join("aws-state");
        let home = root.join("qsb-home");
        fs::create_dir_all(&state).expect("mkdir state");
        fs::create_dir_all(&home).expect("mkdir home");
        fs::write(&bin, FAKE_AWS).expect("write fake aws");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&bin).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&bin, perms).expect("chmod");
        }
        Self {
            bin,
            log,
            state,
            home,
        }
    }

    pub fn set_analyses(&self, analyses: &[(&str, &str, &str)]) {
        let list = analyses
            .iter()
            .map(|(id, name, updated)| {
                serde_json::json!({
                    "Arn": format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:analysis/{id}"),
                    "AnalysisId": id,
                    "Name": name,
                    "Status": "UPDATE_SUCCESSFUL",
                    "CreatedTime": "2023-06-01T00:00:00+00:00",
                    "LastUpdatedTime": updated,
                })
            })
            .collect::<Vec<_>>();
        let body = serde_json::json!({ "AnalysisSummaryList": list, "Status": 200 });
        fs::write(self.state.join("analyses.json"), body.to_string()).expect("write analyses");
    }

    pub fn set_folder_members(&self, ids: &[&str]) {
        let list = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "MemberId": id,
                    "MemberArn": format!("arn:aws:quicksight:us-east-1:{ACCOUNT}:analysis/{id}"),
                })
            })
            .collect::<Vec<_>>();
        let body = serde_json::json!({ "FolderMemberList": list, "Status": 200 });
        fs::write(self.state.join("members.json"), body.to_string()).expect("write members");
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let needle = format!("quicksight {operation} ");
        self.calls()
            .into_iter()
            .filter(|line| line.starts_with(&needle))
            .collect()
    }

    pub fn command(&self, cwd: &Path) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("qs-backup");
        cmd.current_dir(cwd)
            .env("QSB_HOME", &self.home)
            .env("QSB_AWS_BIN", &self.bin)
            .env("FAKE_AWS_LOG", &self.log)
            .env("FAKE_AWS_STATE", &self.state);
        cmd
    }
}
