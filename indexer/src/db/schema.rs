// @generated in spirit: hand-written to match the domain model of §3, not
// emitted by `diesel print-schema` (there is no live database in this
// workspace to introspect).

diesel::table! {
    blocks (hash) {
        hash -> Text,
        level -> BigInt,
        predecessor_hash -> Text,
        timestamp -> Timestamptz,
        protocol -> Text,
        baker -> Text,
        metadata_blob -> Jsonb,
    }
}

diesel::table! {
    transactions (block_hash, op_index) {
        block_hash -> Text,
        op_index -> Integer,
        source -> Text,
        destination -> Nullable<Text>,
        fee -> BigInt,
        counter -> BigInt,
        kind -> Text,
    }
}

diesel::table! {
    receipts (block_hash, op_index) {
        block_hash -> Text,
        op_index -> Integer,
        status -> Text,
        gas_used -> Nullable<BigInt>,
    }
}

diesel::table! {
    logs (block_hash, op_index, log_index) {
        block_hash -> Text,
        op_index -> Integer,
        log_index -> Integer,
        address -> Text,
        topics -> Array<Text>,
        data -> Text,
    }
}

diesel::table! {
    account_checkpoints (account_id, block_level, block_hash) {
        account_id -> Text,
        block_level -> BigInt,
        block_hash -> Text,
        cycle -> Integer,
    }
}

diesel::table! {
    baker_checkpoints (baker_id, block_level, block_hash) {
        baker_id -> Text,
        block_level -> BigInt,
        block_hash -> Text,
        cycle -> Integer,
    }
}

diesel::table! {
    account_snapshots (account_id, block_level) {
        account_id -> Text,
        block_level -> BigInt,
        balance -> BigInt,
        delegate -> Nullable<Text>,
        counter -> BigInt,
    }
}

diesel::table! {
    baker_snapshots (baker_id, block_level) {
        baker_id -> Text,
        block_level -> BigInt,
        staking_balance -> BigInt,
        delegated_balance -> BigInt,
        deactivated -> Bool,
    }
}

diesel::table! {
    rights (level, delegate, kind) {
        level -> BigInt,
        cycle -> Integer,
        delegate -> Text,
        slot -> Integer,
        kind -> Text,
        estimated_time -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    reset_events (protocol, activation_level) {
        protocol -> Text,
        activation_level -> BigInt,
        kind -> Text,
        applied -> Bool,
    }
}

diesel::table! {
    token_transfers (block_hash, op_index, log_index) {
        block_hash -> Text,
        op_index -> Integer,
        log_index -> Integer,
        contract -> Text,
        from_account -> Text,
        to_account -> Text,
        amount -> Text,
    }
}

diesel::table! {
    token_balances (contract, account_id, block_level) {
        contract -> Text,
        account_id -> Text,
        block_level -> BigInt,
        balance -> Text,
    }
}

diesel::table! {
    fee_aggregates (kind, computed_at) {
        kind -> Text,
        mean -> BigInt,
        high -> BigInt,
        low -> BigInt,
        computed_at -> Timestamptz,
    }
}

diesel::table! {
    tns_entries (name) {
        name -> Text,
        account_id -> Text,
        block_level -> BigInt,
    }
}

diesel::table! {
    eth_blocks (hash) {
        hash -> Text,
        number -> BigInt,
        parent_hash -> Text,
        timestamp -> Timestamptz,
        miner -> Text,
    }
}

diesel::table! {
    eth_account_checkpoints (account_id, block_number, block_hash) {
        account_id -> Text,
        block_number -> BigInt,
        block_hash -> Text,
    }
}

diesel::table! {
    eth_accounts (account_id, block_number) {
        account_id -> Text,
        block_number -> BigInt,
        balance -> Text,
        nonce -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    blocks,
    transactions,
    receipts,
    logs,
    account_checkpoints,
    baker_checkpoints,
    account_snapshots,
    baker_snapshots,
    rights,
    reset_events,
    token_transfers,
    token_balances,
    fee_aggregates,
    tns_entries,
    eth_blocks,
    eth_account_checkpoints,
    eth_accounts,
);
