//! Fake tracker: every route resolves to the cluster's one storage daemon,
//! under a second address for fetch routes when one is configured.

use fdfs_proto::tracker::{QueryFileReq, QueryStoreReq};
use fdfs_proto::{Command, StorageServer};

use crate::server::{Reply, EINVAL, ENOENT};
use crate::ClusterState;

pub(crate) fn handle(state: &ClusterState, cmd: u8, body: &[u8]) -> Reply {
    let Ok(command) = Command::try_from(cmd) else {
        return Reply::Status(EINVAL);
    };
    if let Some(status) = state.failing.get(&cmd) {
        return Reply::Status(*status);
    }

    let server = StorageServer {
        group_name: state.group_name.clone(),
        ip_addr: state.storage_ip.clone(),
        port: state.storage_port,
        store_path_index: 0,
    };

    let encoded = match command {
        Command::QueryStoreWithoutGroupOne | Command::QueryStoreWithGroupOne => {
            match QueryStoreReq::decode(command, body) {
                Ok(req) if req.group_name.as_deref().is_some_and(|g| g != state.group_name) => {
                    return Reply::Status(ENOENT);
                }
                Ok(_) => server.encode_store(),
                Err(_) => return Reply::Status(EINVAL),
            }
        }
        Command::QueryFetchOne | Command::QueryUpdate => match QueryFileReq::decode(body) {
            Ok(req) if req.group_name != state.group_name => return Reply::Status(ENOENT),
            Ok(_) => match (&state.fetch_ip, command) {
                (Some(ip), Command::QueryFetchOne) => StorageServer {
                    ip_addr: ip.clone(),
                    ..server
                }
                .encode_fetch(),
                _ => server.encode_fetch(),
            },
            Err(_) => return Reply::Status(EINVAL),
        },
        _ => return Reply::Status(EINVAL),
    };

    match encoded {
        Ok(body) => Reply::Body(body),
        Err(_) => Reply::Status(EINVAL),
    }
}
